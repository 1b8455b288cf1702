//! 0–100 confidence score for a fitted calibration.

use crate::placement::PlacementStats;
use serde::{Deserialize, Serialize};

/// Shape of the confidence curve.
///
/// `base = max_base * exp(-max(0, e - error_tolerance_px) / error_decay_px)`
/// for RMS error `e`, plus up to `max_bonus` points for small board misses
/// while `base >= bonus_floor`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidenceParams {
    pub max_base: f64,
    pub error_tolerance_px: f64,
    pub error_decay_px: f64,
    pub max_bonus: f64,
    pub bonus_floor: f64,
    /// Mean miss at which the mean half of the bonus reaches zero.
    pub mean_miss_scale_mm: f64,
    /// Max miss at which the max half of the bonus reaches zero.
    pub max_miss_scale_mm: f64,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            max_base: 96.0,
            error_tolerance_px: 0.5,
            error_decay_px: 4.0,
            max_bonus: 4.0,
            bonus_floor: 60.0,
            mean_miss_scale_mm: 5.0,
            max_miss_scale_mm: 10.0,
        }
    }
}

fn closeness(miss_mm: f64, scale_mm: f64) -> f64 {
    if !miss_mm.is_finite() || scale_mm <= 0.0 {
        return 0.0;
    }
    1.0 - (miss_mm / scale_mm).clamp(0.0, 1.0)
}

/// Confidence in `[0, 100]` for a fit with RMS error `error_px`.
///
/// Exactly `0.0` when any placement is invalid or the error is not finite.
/// Non-increasing in `error_px` for fixed placements.
pub fn confidence(error_px: f64, stats: &PlacementStats, params: &ConfidenceParams) -> f64 {
    if !stats.all_valid || !error_px.is_finite() || error_px < 0.0 {
        return 0.0;
    }

    let excess = (error_px - params.error_tolerance_px).max(0.0);
    let base = params.max_base * (-excess / params.error_decay_px).exp();

    let bonus = if base >= params.bonus_floor {
        0.5 * params.max_bonus
            * (closeness(stats.mean_miss_mm, params.mean_miss_scale_mm)
                + closeness(stats.max_miss_mm, params.max_miss_scale_mm))
    } else {
        0.0
    };

    let score = base + bonus;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
