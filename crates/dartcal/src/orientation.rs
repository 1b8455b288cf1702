//! Board rotation as seen by the camera.

use crate::board::{Target, SECTOR_ANGLE, TARGET_COUNT};
use dartcal_core::{board_to_image, BoardPoint, Degeneracy, Homography, HomographyError};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(a: f64) -> f64 {
    let t = a.rem_euclid(TAU);
    if t > PI {
        t - TAU
    } else {
        t
    }
}

/// Rotation of the board in the image, in radians.
///
/// Projects the bull and the 12 o'clock rim target through `h` and measures
/// the direction between them against image "up". `0` for an upright board,
/// positive when the board appears rotated clockwise. Result in `(-π, π]`.
pub fn detect_orientation(
    h: &Homography,
    targets: &[BoardPoint; TARGET_COUNT],
) -> Result<f64, HomographyError> {
    let center = board_to_image(h, targets[Target::Bull.index()]).ok_or(Degeneracy::NonFinite)?;
    let top = board_to_image(h, targets[Target::D20.index()]).ok_or(Degeneracy::NonFinite)?;
    let (dx, dy) = (top.x - center.x, top.y - center.y);
    if dx == 0.0 && dy == 0.0 {
        return Err(Degeneracy::Singular.into());
    }
    Ok(wrap_angle(dy.atan2(dx) + FRAC_PI_2))
}

/// Whole sectors the board is turned by: `round(theta / 18°) mod 20`.
pub fn sector_offset(theta: f64) -> u8 {
    if !theta.is_finite() {
        return 0;
    }
    ((theta / SECTOR_ANGLE).round() as i64).rem_euclid(20) as u8
}
