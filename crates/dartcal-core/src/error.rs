use std::fmt;

/// Why a correspondence set could not produce a usable homography.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Degeneracy {
    /// Fewer than four correspondences.
    TooFewPoints { got: usize },
    /// Board and image point lists differ in length.
    LengthMismatch { board: usize, image: usize },
    /// Board points are collinear (all of them, or three of a minimal set).
    Collinear,
    /// The solve produced NaN or infinity.
    NonFinite,
    /// The solved matrix has a (numerically) zero determinant.
    Singular,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::TooFewPoints { got } => {
                write!(f, "need at least 4 correspondences, got {got}")
            }
            Degeneracy::LengthMismatch { board, image } => {
                write!(f, "{board} board points vs {image} image points")
            }
            Degeneracy::Collinear => f.write_str("board points are collinear"),
            Degeneracy::NonFinite => f.write_str("solve produced non-finite values"),
            Degeneracy::Singular => f.write_str("solved matrix is singular"),
        }
    }
}

/// Errors returned by homography estimation and inversion.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum HomographyError {
    #[error("degenerate correspondence set: {0}")]
    Degenerate(Degeneracy),
    #[error("no consensus (best candidate had {inliers} inliers, need {needed})")]
    NoConsensus { inliers: usize, needed: usize },
    #[error("homography is not invertible")]
    NonInvertible,
}

impl From<Degeneracy> for HomographyError {
    fn from(reason: Degeneracy) -> Self {
        HomographyError::Degenerate(reason)
    }
}
