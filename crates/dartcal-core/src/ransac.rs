//! RANSAC wrapper around the DLT estimator.
//!
//! Used when a correspondence set may contain an outlier, typically the fifth
//! point of an automatic detector. Minimal subsets whose board points contain
//! a collinear triple are skipped, so with the usual "four rim points + bull"
//! layout only the subsets that actually constrain `H` get a vote.

use crate::homography::has_collinear_triple;
use crate::{estimate_homography, rms_error, Correspondence, Degeneracy, Homography, HomographyError};
use log::{debug, warn};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Points in a minimal homography sample.
pub const MIN_SAMPLE_SIZE: usize = 4;

/// RANSAC settings. Threshold and iteration budget are caller configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Reprojection distance (pixels) under which a correspondence is an inlier.
    pub threshold_px: f64,
    /// Number of minimal subsets to draw.
    pub max_iterations: usize,
    /// PRNG seed; identical inputs and seed give identical results.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold_px: 8.0,
            max_iterations: 200,
            seed: 0,
        }
    }
}

/// Result of a robust fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobustFit {
    /// Homography refit on the full inlier set.
    pub homography: Homography,
    /// RMS reprojection error (pixels) over the inliers.
    pub error_px: f64,
    /// Indices into the input slice, ascending.
    pub inliers: Vec<usize>,
}

struct Candidate {
    homography: Homography,
    inliers: Vec<usize>,
    total_error: f64,
}

fn score_candidate(h: &Homography, correspondences: &[Correspondence], threshold: f64) -> Candidate {
    let mut inliers = Vec::with_capacity(correspondences.len());
    let mut total_error = 0.0;
    for (idx, c) in correspondences.iter().enumerate() {
        let Some(q) = h.apply(c.board.to_point2()) else {
            continue;
        };
        let err = (q.x - c.image.x).hypot(q.y - c.image.y);
        if err <= threshold {
            inliers.push(idx);
            total_error += err;
        }
    }
    Candidate {
        homography: *h,
        inliers,
        total_error,
    }
}

fn is_better(candidate: &Candidate, best: Option<&Candidate>) -> bool {
    match best {
        None => true,
        Some(b) => {
            candidate.inliers.len() > b.inliers.len()
                || (candidate.inliers.len() == b.inliers.len()
                    && candidate.total_error < b.total_error)
        }
    }
}

/// Robustly estimate `H` with seeded RANSAC.
///
/// See [`estimate_homography_ransac_cancellable`] for the algorithm.
pub fn estimate_homography_ransac(
    correspondences: &[Correspondence],
    params: &RansacParams,
) -> Result<RobustFit, HomographyError> {
    let never = AtomicBool::new(false);
    estimate_homography_ransac_cancellable(correspondences, params, &never)
}

/// Robustly estimate `H`, checking `cancel` between iterations.
///
/// Each iteration draws [`MIN_SAMPLE_SIZE`] distinct indices, fits the DLT on
/// them and counts the correspondences that reproject within
/// `params.threshold_px`. The candidate with the most inliers wins; ties go to
/// the lowest summed inlier error. The winner is refit on its whole inlier set
/// and `error_px` is the RMS over that set.
///
/// Fails with [`HomographyError::NoConsensus`] when no candidate reaches
/// [`MIN_SAMPLE_SIZE`] inliers, including when cancelled before one did.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip(correspondences, params, cancel),
        fields(n = correspondences.len(), threshold = params.threshold_px)
    )
)]
pub fn estimate_homography_ransac_cancellable(
    correspondences: &[Correspondence],
    params: &RansacParams,
    cancel: &AtomicBool,
) -> Result<RobustFit, HomographyError> {
    let n = correspondences.len();
    if n < MIN_SAMPLE_SIZE {
        return Err(Degeneracy::TooFewPoints { got: n }.into());
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<Candidate> = None;
    let mut skipped = 0usize;

    for iteration in 0..params.max_iterations {
        if cancel.load(Ordering::Relaxed) {
            debug!("ransac: cancelled after {iteration} iterations");
            break;
        }

        let sample: Vec<Correspondence> = rand::seq::index::sample(&mut rng, n, MIN_SAMPLE_SIZE)
            .into_iter()
            .map(|idx| correspondences[idx])
            .collect();
        let board: Vec<Point2<f64>> = sample.iter().map(|c| c.board.to_point2()).collect();
        if has_collinear_triple(&board) {
            skipped += 1;
            continue;
        }

        let Ok(h) = estimate_homography(&sample) else {
            skipped += 1;
            continue;
        };

        let candidate = score_candidate(&h, correspondences, params.threshold_px);
        if is_better(&candidate, best.as_ref()) {
            best = Some(candidate);
        }
    }

    let best_inliers = best.as_ref().map_or(0, |b| b.inliers.len());
    let Some(best) = best.filter(|b| b.inliers.len() >= MIN_SAMPLE_SIZE) else {
        warn!("ransac: no consensus (best={best_inliers}, skipped subsets={skipped})");
        return Err(HomographyError::NoConsensus {
            inliers: best_inliers,
            needed: MIN_SAMPLE_SIZE,
        });
    };

    let inlier_set: Vec<Correspondence> = best.inliers.iter().map(|&i| correspondences[i]).collect();
    let homography = match estimate_homography(&inlier_set) {
        Ok(h) => h,
        Err(err) => {
            debug!("ransac: refit on {} inliers failed ({err}), keeping sample fit", inlier_set.len());
            best.homography
        }
    };

    let error_px = rms_error(&homography, &inlier_set).ok_or(HomographyError::NoConsensus {
        inliers: best.inliers.len(),
        needed: MIN_SAMPLE_SIZE,
    })?;

    debug!(
        "ransac: {}/{} inliers, rms={:.4}px, skipped subsets={}",
        best.inliers.len(),
        n,
        error_px,
        skipped
    );

    Ok(RobustFit {
        homography,
        error_px,
        inliers: best.inliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardPoint, ImagePoint};
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;

    fn tilted_camera() -> Homography {
        Homography::new(Matrix3::new(
            2.1, 0.15, 640.0, //
            -0.08, 1.8, 360.0, //
            0.0004, 0.0009, 1.0,
        ))
    }

    fn synthetic(h: &Homography) -> Vec<Correspondence> {
        [
            (0.0, -170.0),
            (170.0, 0.0),
            (0.0, 170.0),
            (-170.0, 0.0),
            (0.0, 0.0),
        ]
        .into_iter()
        .map(|(x, y)| {
            let board = BoardPoint::new(x, y);
            let q = h.apply(board.to_point2()).expect("finite");
            Correspondence::new(board, ImagePoint::from(q))
        })
        .collect()
    }

    #[test]
    fn clean_set_keeps_every_point() {
        let corr = synthetic(&tilted_camera());
        let fit = estimate_homography_ransac(&corr, &RansacParams::default()).expect("fit");
        assert_eq!(fit.inliers, vec![0, 1, 2, 3, 4]);
        assert!(fit.error_px < 1e-6, "rms {}", fit.error_px);
    }

    #[test]
    fn shifted_bull_is_rejected() {
        let mut corr = synthetic(&tilted_camera());
        corr[4].image.x += 500.0;

        let fit = estimate_homography_ransac(&corr, &RansacParams::default()).expect("fit");
        assert_eq!(fit.inliers, vec![0, 1, 2, 3]);

        let reference = estimate_homography(&corr[..4]).expect("four point fit");
        let reference_rms = rms_error(&reference, &corr[..4]).expect("finite");
        assert_abs_diff_eq!(fit.error_px, reference_rms, epsilon = 1e-9);

        let noisy = estimate_homography(&corr).expect("five point fit");
        let noisy_rms = rms_error(&noisy, &corr).expect("finite");
        assert!(noisy_rms > 50.0, "five point rms {noisy_rms}");
    }

    #[test]
    fn same_seed_same_result() {
        let mut corr = synthetic(&tilted_camera());
        corr[4].image.y -= 120.0;
        let params = RansacParams {
            seed: 17,
            ..RansacParams::default()
        };
        let a = estimate_homography_ransac(&corr, &params).expect("fit");
        let b = estimate_homography_ransac(&corr, &params).expect("fit");
        assert_eq!(a, b);
    }

    #[test]
    fn only_collinear_subsets_means_no_consensus() {
        // every 4-subset contains three points of the same line
        let corr: Vec<Correspondence> = (0..5)
            .map(|k| {
                let t = k as f64 * 25.0;
                Correspondence::new(BoardPoint::new(t, 0.0), ImagePoint::new(2.0 * t, 10.0))
            })
            .collect();
        let err = estimate_homography_ransac(&corr, &RansacParams::default()).unwrap_err();
        assert_eq!(err, HomographyError::NoConsensus { inliers: 0, needed: 4 });
    }

    #[test]
    fn cancelled_before_first_iteration() {
        let corr = synthetic(&tilted_camera());
        let cancel = AtomicBool::new(true);
        let err = estimate_homography_ransac_cancellable(&corr, &RansacParams::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, HomographyError::NoConsensus { inliers: 0, .. }));
    }

    #[test]
    fn too_few_points_is_degenerate() {
        let corr = &synthetic(&tilted_camera())[..3];
        assert_eq!(
            estimate_homography_ransac(corr, &RansacParams::default()),
            Err(HomographyError::Degenerate(Degeneracy::TooFewPoints { got: 3 }))
        );
    }
}
