//! Board ↔ image coordinate mapping and reprojection error.

use crate::{BoardPoint, Correspondence, Homography, ImagePoint};

/// Forward map: board millimeters to image pixels.
///
/// `None` when the board point lands at infinity under `h`.
#[inline]
pub fn board_to_image(h: &Homography, p: BoardPoint) -> Option<ImagePoint> {
    h.apply(p.to_point2()).map(ImagePoint::from)
}

/// Inverse map: image pixels to board millimeters through `H⁻¹`.
///
/// `None` when `h` is not invertible or the pixel maps to infinity.
pub fn image_to_board(h: &Homography, p: ImagePoint) -> Option<BoardPoint> {
    let inv = h.inverse().ok()?;
    inv.apply(p.to_point2()).map(BoardPoint::from)
}

/// Per-correspondence reprojection distance in pixels.
///
/// `None` if any board point cannot be projected.
pub fn reprojection_errors(h: &Homography, correspondences: &[Correspondence]) -> Option<Vec<f64>> {
    correspondences
        .iter()
        .map(|c| board_to_image(h, c.board).map(|q| q.distance(c.image)))
        .collect()
}

/// Root-mean-square reprojection error in pixels.
///
/// This is the accuracy metric used for scoring and persisted records.
/// `None` for an empty set, an unprojectable point or a non-finite result.
pub fn rms_error(h: &Homography, correspondences: &[Correspondence]) -> Option<f64> {
    if correspondences.is_empty() {
        return None;
    }
    let errors = reprojection_errors(h, correspondences)?;
    let mean_sq = errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64;
    let rms = mean_sq.sqrt();
    rms.is_finite().then_some(rms)
}
