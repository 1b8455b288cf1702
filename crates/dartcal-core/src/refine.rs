//! Edge snapping for coarse clicks / detections.
//!
//! A rough pixel is moved onto the strongest Sobel edge within a disk of
//! `search_radius_px` around it. Flat neighborhoods leave the point alone.

use crate::{GrayImageView, ImagePoint};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

type Kernel3 = [[i32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Search disk radius in pixels.
    pub search_radius_px: u32,
    /// Gradient magnitudes at or below this are treated as noise.
    ///
    /// Sobel magnitude on 8-bit input spans `0..=~1442`; a hard step of
    /// contrast `c` gives `4c`.
    pub min_gradient: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            search_radius_px: 6,
            min_gradient: 40.0,
        }
    }
}

/// Sobel gradient magnitude at `(x, y)` with border clamping.
pub fn sobel_magnitude(img: &GrayImageView<'_>, x: i64, y: i64) -> f32 {
    let mut gx = 0i32;
    let mut gy = 0i32;
    for (ky, dy) in (-1i64..=1).enumerate() {
        for (kx, dx) in (-1i64..=1).enumerate() {
            let v = img.get_clamped(x + dx, y + dy) as i32;
            gx += SOBEL_KERNEL_X[ky][kx] * v;
            gy += SOBEL_KERNEL_Y[ky][kx] * v;
        }
    }
    ((gx * gx + gy * gy) as f32).sqrt()
}

/// Snap `rough` onto the strongest nearby edge using default thresholds.
pub fn refine_point(img: &GrayImageView<'_>, rough: ImagePoint, search_radius_px: u32) -> ImagePoint {
    let params = RefineParams {
        search_radius_px,
        ..RefineParams::default()
    };
    refine_point_with(img, rough, &params)
}

/// Snap `rough` onto the pixel of maximal Sobel magnitude inside the disk of
/// radius `params.search_radius_px` around it.
///
/// Ties go to the candidate closest to `rough`. The input is returned
/// unchanged when nothing in the disk exceeds `params.min_gradient`, when the
/// image is empty or when `rough` is not finite. The result is never farther
/// than the search radius from `rough`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(img, params), fields(x = rough.x, y = rough.y))
)]
pub fn refine_point_with(
    img: &GrayImageView<'_>,
    rough: ImagePoint,
    params: &RefineParams,
) -> ImagePoint {
    if img.width == 0 || img.height == 0 || !rough.is_finite() {
        return rough;
    }

    let r = params.search_radius_px as i64;
    let radius = params.search_radius_px as f64;
    // No pixel of the disk can lie inside the image.
    if rough.x < -radius
        || rough.y < -radius
        || rough.x > (img.width - 1) as f64 + radius
        || rough.y > (img.height - 1) as f64 + radius
    {
        return rough;
    }
    let cx = rough.x.round() as i64;
    let cy = rough.y.round() as i64;

    // (magnitude, distance, x, y)
    let mut best: Option<(f32, f64, i64, i64)> = None;
    for y in (cy - r)..=(cy + r) {
        for x in (cx - r)..=(cx + r) {
            if !img.contains(x, y) {
                continue;
            }
            let dist = (x as f64 - rough.x).hypot(y as f64 - rough.y);
            if dist > radius {
                continue;
            }
            let mag = sobel_magnitude(img, x, y);
            if mag <= params.min_gradient {
                continue;
            }
            let better = match best {
                None => true,
                Some((bm, bd, _, _)) => mag > bm || (mag == bm && dist < bd),
            };
            if better {
                best = Some((mag, dist, x, y));
            }
        }
    }

    match best {
        Some((_, _, x, y)) => ImagePoint::new(x as f64, y as f64),
        None => rough,
    }
}
