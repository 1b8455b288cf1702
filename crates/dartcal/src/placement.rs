//! Per-target geometric sanity checks.
//!
//! Each clicked pixel is mapped back to the board through the fitted `H` and
//! compared with where its target physically is. A rim click must land on
//! (or just next to) the double ring near its own sector; a bull click must
//! land on the bull.

use crate::board::{BoardRadii, Target};
use dartcal_core::{image_to_board, BoardPoint, Homography, ImagePoint};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementParams {
    /// Slack (mm) around the double ring for rim targets and past the outer
    /// bull for the bull target.
    pub radius_tolerance_mm: f64,
    /// Maximum distance (mm) between a rim click and its target.
    pub rim_proximity_mm: f64,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            radius_tolerance_mm: 6.0,
            rim_proximity_mm: 30.0,
        }
    }
}

/// Outcome of checking one clicked point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub target: Target,
    /// Click mapped back to board space, if `H` could be inverted.
    pub board: Option<BoardPoint>,
    /// Distance of [`Placement::board`] from the board center.
    pub radius_mm: Option<f64>,
    /// Distance of [`Placement::board`] from the target position.
    pub board_miss_mm: Option<f64>,
    pub is_valid: bool,
}

/// Check where `clicked` lands on the board under `h`.
///
/// A click that cannot be mapped back is invalid.
pub fn evaluate_placement(
    target: Target,
    clicked: ImagePoint,
    target_board: BoardPoint,
    h: &Homography,
    radii: &BoardRadii,
    params: &PlacementParams,
) -> Placement {
    let Some(board) = image_to_board(h, clicked) else {
        return Placement {
            target,
            board: None,
            radius_mm: None,
            board_miss_mm: None,
            is_valid: false,
        };
    };

    let radius = board.radius();
    let miss = board.distance(target_board);
    let tol = params.radius_tolerance_mm;
    let is_valid = if target.is_rim() {
        radius >= radii.double_inner - tol
            && radius <= radii.double_outer + tol
            && miss < params.rim_proximity_mm
    } else {
        radius <= radii.bull_outer + tol
    };

    Placement {
        target,
        board: Some(board),
        radius_mm: Some(radius),
        board_miss_mm: Some(miss),
        is_valid,
    }
}

/// Aggregate over a set of placements, consumed by the confidence score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementStats {
    pub count: usize,
    pub all_valid: bool,
    pub mean_miss_mm: f64,
    pub max_miss_mm: f64,
}

impl PlacementStats {
    /// An empty set is never valid.
    pub fn from_placements(placements: &[Placement]) -> Self {
        let misses: Vec<f64> = placements.iter().filter_map(|p| p.board_miss_mm).collect();
        let all_valid = !placements.is_empty()
            && misses.len() == placements.len()
            && placements.iter().all(|p| p.is_valid);
        let (mean_miss_mm, max_miss_mm) = if misses.is_empty() {
            (f64::INFINITY, f64::INFINITY)
        } else {
            (
                misses.iter().sum::<f64>() / misses.len() as f64,
                misses.iter().copied().fold(0.0, f64::max),
            )
        };
        Self {
            count: placements.len(),
            all_valid,
            mean_miss_mm,
            max_miss_mm,
        }
    }
}
