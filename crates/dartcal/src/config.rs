use crate::board::BoardRadii;
use crate::confidence::ConfidenceParams;
use crate::placement::PlacementParams;
use dartcal_core::{RansacParams, RefineParams};
use serde::{Deserialize, Serialize};

/// Everything a [`crate::CalibrationSession`] can be tuned with.
///
/// Every field falls back to its default when missing from JSON, so `{}` is
/// a valid config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub radii: BoardRadii,
    /// Fit full point sets with RANSAC (falling back to plain DLT).
    pub robust: bool,
    pub ransac: RansacParams,
    pub refine: RefineParams,
    pub placement: PlacementParams,
    pub confidence: ConfidenceParams,
}
