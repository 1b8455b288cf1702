//! Interactive calibration session.
//!
//! Points are collected one target at a time. Whenever four or more are
//! present the homography, RMS error, placements and confidence are
//! recomputed. A complete fit can be locked, which fixes the record, derives
//! the board orientation and pushes it into the history.

use crate::board::{canonical_targets, BoardError, Target, TARGET_COUNT};
use crate::confidence::confidence;
use crate::config::CalibrationConfig;
use crate::orientation::{detect_orientation, sector_offset};
use crate::placement::{evaluate_placement, Placement, PlacementStats};
use crate::record::{CalibrationRecord, History};
use dartcal_core::{
    estimate_homography, estimate_homography_ransac, refine_point_with, rms_error, BoardPoint,
    Correspondence, Degeneracy, GrayImageView, Homography, HomographyError, ImagePoint,
    MIN_SAMPLE_SIZE,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No points.
    Idle,
    /// Some points, or all of them without a usable fit.
    Collecting,
    /// All targets placed and fitted, not yet accepted.
    Computed,
    /// The record is accepted and immutable.
    Locked,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("calibration is locked")]
    Locked,
    #[error("target {0} already has a point")]
    DuplicateTarget(Target),
    #[error("every target already has a point")]
    Full,
    #[error("image point is not finite")]
    NonFinitePoint,
    #[error("no complete fit to lock")]
    NotComputed,
    #[error("calibration is not locked")]
    NotLocked,
    #[error("no history entry {0}")]
    NoSuchHistoryEntry(usize),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Homography(#[from] HomographyError),
}

/// Current fit of the collected points.
#[derive(Clone, Debug, PartialEq)]
struct Fit {
    homography: Homography,
    error_px: f64,
    placements: Vec<Placement>,
    confidence: f64,
}

#[derive(Clone, Debug)]
pub struct CalibrationSession {
    config: CalibrationConfig,
    targets: [BoardPoint; TARGET_COUNT],
    image_size: [u32; 2],
    overlay_size: [u32; 2],
    /// Collected points in insertion order.
    points: Vec<(Target, ImagePoint)>,
    fit: Option<Fit>,
    last_error: Option<HomographyError>,
    locked: Option<CalibrationRecord>,
    history: History,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl CalibrationSession {
    pub fn new(config: CalibrationConfig) -> Result<Self, SessionError> {
        config.radii.validate()?;
        Ok(Self {
            targets: canonical_targets(&config.radii),
            config,
            image_size: [0, 0],
            overlay_size: [0, 0],
            points: Vec::with_capacity(TARGET_COUNT),
            fit: None,
            last_error: None,
            locked: None,
            history: History::new(),
        })
    }

    /// Frame sizes stamped into produced records.
    pub fn with_frame_sizes(mut self, image_size: [u32; 2], overlay_size: [u32; 2]) -> Self {
        self.image_size = image_size;
        self.overlay_size = overlay_size;
        self
    }

    /// Start from a previously stored history.
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        if self.locked.is_some() {
            SessionState::Locked
        } else if self.points.is_empty() {
            SessionState::Idle
        } else if self.points.len() == TARGET_COUNT && self.fit.is_some() {
            SessionState::Computed
        } else {
            SessionState::Collecting
        }
    }

    /// Collected points in insertion order.
    pub fn points(&self) -> &[(Target, ImagePoint)] {
        &self.points
    }

    /// First target without a point, in [`Target::ALL`] order.
    pub fn next_target(&self) -> Option<Target> {
        Target::ALL
            .into_iter()
            .find(|t| !self.points.iter().any(|(p, _)| p == t))
    }

    pub fn homography(&self) -> Option<&Homography> {
        self.fit.as_ref().map(|f| &f.homography)
    }

    /// RMS error of the current fit, available from four points on.
    pub fn error_px(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.error_px)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.confidence)
    }

    pub fn placements(&self) -> &[Placement] {
        self.fit
            .as_ref()
            .map(|f| f.placements.as_slice())
            .unwrap_or_default()
    }

    /// Why the last recompute produced no fit, if it failed.
    pub fn last_error(&self) -> Option<&HomographyError> {
        self.last_error.as_ref()
    }

    /// Place `image` for `target` and recompute.
    pub fn add_point(
        &mut self,
        target: Target,
        image: ImagePoint,
    ) -> Result<SessionState, SessionError> {
        if self.locked.is_some() {
            return Err(SessionError::Locked);
        }
        if !image.is_finite() {
            return Err(SessionError::NonFinitePoint);
        }
        if self.points.iter().any(|(t, _)| *t == target) {
            return Err(SessionError::DuplicateTarget(target));
        }
        if self.points.len() >= TARGET_COUNT {
            return Err(SessionError::Full);
        }
        self.points.push((target, image));
        self.recompute();
        Ok(self.state())
    }

    /// Place `image` for [`CalibrationSession::next_target`].
    pub fn add_next(&mut self, image: ImagePoint) -> Result<SessionState, SessionError> {
        if self.locked.is_some() {
            return Err(SessionError::Locked);
        }
        let target = self.next_target().ok_or(SessionError::Full)?;
        self.add_point(target, image)
    }

    /// Snap `rough` onto a nearby edge of `img` first, then add it.
    ///
    /// Returns the point that was actually stored.
    pub fn add_point_refined(
        &mut self,
        target: Target,
        rough: ImagePoint,
        img: &GrayImageView<'_>,
    ) -> Result<ImagePoint, SessionError> {
        let refined = refine_point_with(img, rough, &self.config.refine);
        if refined != rough {
            debug!(
                "refined {target}: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                rough.x, rough.y, refined.x, refined.y
            );
        }
        self.add_point(target, refined)?;
        Ok(refined)
    }

    /// Drop the most recently added point and recompute.
    pub fn undo(&mut self) -> Result<Option<Target>, SessionError> {
        if self.locked.is_some() {
            return Err(SessionError::Locked);
        }
        let removed = self.points.pop().map(|(t, _)| t);
        self.recompute();
        Ok(removed)
    }

    /// Back to [`SessionState::Idle`]. The active record is discarded; the
    /// history is kept.
    pub fn reset(&mut self) {
        self.points.clear();
        self.fit = None;
        self.last_error = None;
        self.locked = None;
    }

    /// Unlocked record for the current complete fit.
    pub fn preview(&self) -> Option<CalibrationRecord> {
        if let Some(rec) = &self.locked {
            return Some(rec.clone());
        }
        if self.state() != SessionState::Computed {
            return None;
        }
        self.fit.as_ref().map(|fit| self.record_from(fit, 0, false))
    }

    /// The locked record, the only one scoring should consume.
    pub fn active(&self) -> Option<&CalibrationRecord> {
        self.locked.as_ref()
    }

    /// Accept the current fit: derive `theta` / `sectorOffset`, stamp the
    /// time and push the record into the history.
    pub fn lock(&mut self) -> Result<&CalibrationRecord, SessionError> {
        self.lock_at(now_ms())
    }

    /// [`CalibrationSession::lock`] with an explicit timestamp (Unix ms).
    pub fn lock_at(&mut self, created_at: u64) -> Result<&CalibrationRecord, SessionError> {
        if self.locked.is_some() {
            return Err(SessionError::Locked);
        }
        if self.state() != SessionState::Computed {
            return Err(SessionError::NotComputed);
        }
        let fit = self.fit.as_ref().ok_or(SessionError::NotComputed)?;
        let record = self.record_from(fit, created_at, true);
        info!(
            "locked calibration: rms={:.3}px confidence={:.1} theta={:.2}° offset={}",
            record.error_px,
            record.confidence,
            record.theta.to_degrees(),
            record.sector_offset
        );
        self.history.push(record.clone());
        Ok(&*self.locked.insert(record))
    }

    /// Leave [`SessionState::Locked`] for a fresh [`SessionState::Idle`].
    pub fn unlock(&mut self) -> Result<(), SessionError> {
        if self.locked.is_none() {
            return Err(SessionError::NotLocked);
        }
        self.reset();
        Ok(())
    }

    /// Make history entry `index` (0 = newest) the active locked record.
    pub fn restore(&mut self, index: usize) -> Result<&CalibrationRecord, SessionError> {
        let record = self
            .history
            .get(index)
            .cloned()
            .ok_or(SessionError::NoSuchHistoryEntry(index))?;
        self.reset();
        let record = CalibrationRecord {
            locked: true,
            ..record
        };
        Ok(&*self.locked.insert(record))
    }

    fn record_from(&self, fit: &Fit, created_at: u64, locked: bool) -> CalibrationRecord {
        let theta = match detect_orientation(&fit.homography, &self.targets) {
            Ok(theta) => theta,
            Err(err) => {
                warn!("orientation unavailable: {err}");
                0.0
            }
        };
        CalibrationRecord {
            h: fit.homography,
            error_px: fit.error_px,
            confidence: fit.confidence,
            image_size: self.image_size,
            overlay_size: self.overlay_size,
            theta,
            sector_offset: sector_offset(theta),
            created_at,
            locked,
        }
    }

    fn correspondences(&self) -> Vec<Correspondence> {
        self.points
            .iter()
            .map(|&(t, image)| Correspondence::new(self.targets[t.index()], image))
            .collect()
    }

    fn fit_homography(
        &self,
        corr: &[Correspondence],
    ) -> Result<(Homography, f64), HomographyError> {
        if self.config.robust && corr.len() > MIN_SAMPLE_SIZE {
            match estimate_homography_ransac(corr, &self.config.ransac) {
                Ok(fit) => {
                    if fit.inliers.len() < corr.len() {
                        warn!(
                            "ransac kept {}/{} points",
                            fit.inliers.len(),
                            corr.len()
                        );
                    }
                    return Ok((fit.homography, fit.error_px));
                }
                Err(err) => warn!("ransac failed ({err}), falling back to DLT"),
            }
        }
        let h = estimate_homography(corr)?;
        let error_px = rms_error(&h, corr).ok_or(Degeneracy::NonFinite)?;
        Ok((h, error_px))
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self), fields(n = self.points.len()))
    )]
    fn recompute(&mut self) {
        self.fit = None;
        self.last_error = None;
        if self.points.len() < MIN_SAMPLE_SIZE {
            return;
        }

        let corr = self.correspondences();
        let (homography, error_px) = match self.fit_homography(&corr) {
            Ok(fit) => fit,
            Err(err) => {
                warn!("fit on {} points failed: {err}", corr.len());
                self.last_error = Some(err);
                return;
            }
        };

        let placements: Vec<Placement> = self
            .points
            .iter()
            .map(|&(target, image)| {
                evaluate_placement(
                    target,
                    image,
                    self.targets[target.index()],
                    &homography,
                    &self.config.radii,
                    &self.config.placement,
                )
            })
            .collect();
        let stats = PlacementStats::from_placements(&placements);
        let confidence = confidence(error_px, &stats, &self.config.confidence);
        debug!(
            "fit on {} points: rms={error_px:.4}px confidence={confidence:.1} valid={}",
            corr.len(),
            stats.all_valid
        );

        self.fit = Some(Fit {
            homography,
            error_px,
            placements,
            confidence,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dartcal_core::GrayImage;

    fn camera() -> Homography {
        Homography::from_array([
            [1.9, -0.2, 700.0],
            [0.1, 1.6, 420.0],
            [-0.0003, 0.0007, 1.0],
        ])
    }

    fn project(target: Target) -> ImagePoint {
        let board = target.board_point(&crate::BoardRadii::STANDARD);
        ImagePoint::from(camera().apply(board.to_point2()).expect("projectable"))
    }

    fn session() -> CalibrationSession {
        CalibrationSession::new(CalibrationConfig::default()).expect("session")
    }

    #[test]
    fn state_progression() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Idle);
        for (k, t) in Target::ALL.into_iter().enumerate() {
            let state = s.add_point(t, project(t)).expect("add");
            let expected = if k + 1 == TARGET_COUNT {
                SessionState::Computed
            } else {
                SessionState::Collecting
            };
            assert_eq!(state, expected);
            assert_eq!(s.error_px().is_some(), k + 1 >= 4);
        }
        s.lock_at(42).expect("lock");
        assert_eq!(s.state(), SessionState::Locked);
        assert_eq!(s.history().len(), 1);
        s.unlock().expect("unlock");
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.active().is_none());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn duplicate_and_locked_mutations_are_rejected() {
        let mut s = session();
        s.add_point(Target::D20, project(Target::D20)).expect("add");
        assert_eq!(
            s.add_point(Target::D20, project(Target::D20)),
            Err(SessionError::DuplicateTarget(Target::D20))
        );
        assert_eq!(
            s.add_point(Target::D6, ImagePoint::new(f64::NAN, 0.0)),
            Err(SessionError::NonFinitePoint)
        );
        for t in &Target::ALL[1..] {
            s.add_next(project(*t)).expect("add");
        }
        assert_eq!(s.add_next(ImagePoint::new(1.0, 1.0)), Err(SessionError::Full));
        s.lock_at(1).expect("lock");
        assert_eq!(s.add_next(ImagePoint::new(1.0, 1.0)), Err(SessionError::Locked));
        assert_eq!(s.undo(), Err(SessionError::Locked));
        assert!(matches!(s.lock_at(2), Err(SessionError::Locked)));
    }

    #[test]
    fn lock_requires_complete_fit() {
        let mut s = session();
        for t in &Target::ALL[..4] {
            s.add_point(*t, project(*t)).expect("add");
        }
        assert!(matches!(s.lock_at(1), Err(SessionError::NotComputed)));
        assert!(s.preview().is_none());
        assert_eq!(s.unlock(), Err(SessionError::NotLocked));
    }

    #[test]
    fn undo_recomputes() {
        let mut s = session();
        for t in Target::ALL {
            s.add_point(t, project(t)).expect("add");
        }
        assert_eq!(s.undo(), Ok(Some(Target::Bull)));
        assert_eq!(s.state(), SessionState::Collecting);
        assert!(s.error_px().is_some());
        assert_eq!(s.next_target(), Some(Target::Bull));

        assert_eq!(s.undo(), Ok(Some(Target::D11)));
        assert!(s.error_px().is_none());
        for _ in 0..3 {
            s.undo().expect("undo");
        }
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.undo(), Ok(None));
    }

    #[test]
    fn degenerate_clicks_stay_collecting() {
        let mut s = session();
        // all five clicks on one image line
        for (k, t) in Target::ALL.into_iter().enumerate() {
            s.add_point(t, ImagePoint::new(100.0 + 10.0 * k as f64, 50.0))
                .expect("add");
        }
        assert_eq!(s.state(), SessionState::Collecting);
        assert!(s.last_error().is_some());
        assert!(s.preview().is_none());
    }

    #[test]
    fn reset_keeps_history() {
        let mut s = session();
        for t in Target::ALL {
            s.add_point(t, project(t)).expect("add");
        }
        s.lock_at(7).expect("lock");
        s.reset();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.active().is_none());
        assert_eq!(s.history().latest().map(|r| r.created_at), Some(7));
    }

    #[test]
    fn restore_from_history() {
        let mut s = session();
        for t in Target::ALL {
            s.add_point(t, project(t)).expect("add");
        }
        let first = s.lock_at(100).expect("lock").clone();
        s.unlock().expect("unlock");
        for t in Target::ALL {
            let p = project(t);
            s.add_point(t, ImagePoint::new(p.x + 0.5, p.y)).expect("add");
        }
        s.lock_at(200).expect("lock");

        let restored = s.restore(1).expect("restore").clone();
        assert_eq!(restored, first);
        assert_eq!(s.state(), SessionState::Locked);
        assert_eq!(s.restore(5), Err(SessionError::NoSuchHistoryEntry(5)));
    }

    #[test]
    fn refined_point_snaps_to_edge() {
        let img = GrayImage::from_fn(200, 100, |x, _| if x < 120 { 10 } else { 240 });
        let mut s = session();
        let stored = s
            .add_point_refined(Target::D20, ImagePoint::new(116.0, 40.0), &img.view())
            .expect("add");
        assert_eq!(stored, ImagePoint::new(119.0, 40.0));
        assert_eq!(s.points(), &[(Target::D20, stored)]);
    }
}
