//! Board-space and image-space points.
//!
//! The two spaces never mix implicitly: the only way from one to the other is
//! through a [`crate::Homography`] (see [`crate::board_to_image`] and
//! [`crate::image_to_board`]). Both serialize as plain `[x, y]` arrays.

use crate::Degeneracy;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A position on the physical board in millimeters.
///
/// Origin at the bull center, `x` to the right, `y` downwards (the same
/// handedness as image space).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct BoardPoint {
    pub x: f64,
    pub y: f64,
}

/// A position in the camera frame in pixels (origin top-left, `y` down).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

macro_rules! impl_point {
    ($ty:ident) => {
        impl $ty {
            pub const fn new(x: f64, y: f64) -> Self {
                Self { x, y }
            }

            #[inline]
            pub fn to_point2(self) -> Point2<f64> {
                Point2::new(self.x, self.y)
            }

            /// Euclidean distance to another point of the same space.
            #[inline]
            pub fn distance(self, other: Self) -> f64 {
                (self.x - other.x).hypot(self.y - other.y)
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.x.is_finite() && self.y.is_finite()
            }
        }

        impl From<Point2<f64>> for $ty {
            fn from(p: Point2<f64>) -> Self {
                Self::new(p.x, p.y)
            }
        }

        impl From<[f64; 2]> for $ty {
            fn from([x, y]: [f64; 2]) -> Self {
                Self::new(x, y)
            }
        }

        impl From<$ty> for [f64; 2] {
            fn from(p: $ty) -> Self {
                [p.x, p.y]
            }
        }
    };
}

impl_point!(BoardPoint);
impl_point!(ImagePoint);

impl BoardPoint {
    /// Distance from the board center.
    #[inline]
    pub fn radius(self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// One board ↔ image pairing fed to the estimators.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub board: BoardPoint,
    pub image: ImagePoint,
}

impl Correspondence {
    pub const fn new(board: BoardPoint, image: ImagePoint) -> Self {
        Self { board, image }
    }

    /// Pair two parallel point lists.
    pub fn zip(board: &[BoardPoint], image: &[ImagePoint]) -> Result<Vec<Self>, Degeneracy> {
        if board.len() != image.len() {
            return Err(Degeneracy::LengthMismatch {
                board: board.len(),
                image: image.len(),
            });
        }
        Ok(board
            .iter()
            .zip(image)
            .map(|(&b, &i)| Self::new(b, i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_serialize_as_arrays() {
        let c = Correspondence::new(BoardPoint::new(0.0, -170.0), ImagePoint::new(640.5, 12.25));
        let json = serde_json::to_string(&c).expect("serialize");
        assert_eq!(json, r#"{"board":[0.0,-170.0],"image":[640.5,12.25]}"#);

        let back: Correspondence = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, c);
    }

    #[test]
    fn zip_rejects_length_mismatch() {
        let board = [BoardPoint::new(0.0, 0.0), BoardPoint::new(1.0, 0.0)];
        let image = [ImagePoint::new(5.0, 5.0)];
        assert_eq!(
            Correspondence::zip(&board, &image),
            Err(Degeneracy::LengthMismatch { board: 2, image: 1 })
        );
        assert_eq!(Correspondence::zip(&board[..1], &image).map(|c| c.len()), Ok(1));
    }

    #[test]
    fn radius_and_distance() {
        let p = BoardPoint::new(3.0, 4.0);
        assert_eq!(p.radius(), 5.0);
        assert_eq!(p.distance(BoardPoint::new(3.0, 0.0)), 4.0);
    }
}
