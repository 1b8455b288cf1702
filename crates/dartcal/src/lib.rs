//! Dartboard camera calibration.
//!
//! A user (or an external detector) supplies the image positions of five
//! known board landmarks: four points on the outer double ring and the bull.
//! From those this crate fits the board → image homography, judges the fit
//! (RMS error, per-point placement checks, a 0–100 confidence), recovers the
//! board rotation and keeps the accepted result as a [`CalibrationRecord`].
//!
//! ```
//! use dartcal::{CalibrationConfig, CalibrationSession, Target};
//! use dartcal::core::{board_to_image, Homography};
//!
//! let camera = Homography::from_array([[2.0, 0.0, 640.0], [0.0, 2.0, 360.0], [0.0, 0.0, 1.0]]);
//! let mut session = CalibrationSession::new(CalibrationConfig::default())?;
//! for target in Target::ALL {
//!     let board = target.board_point(&session.config().radii);
//!     let pixel = board_to_image(&camera, board).unwrap_or_default();
//!     session.add_point(target, pixel)?;
//! }
//! let record = session.lock()?;
//! assert!(record.error_px < 1e-6);
//! assert!(record.confidence > 99.0);
//! # Ok::<(), dartcal::SessionError>(())
//! ```

mod board;
mod confidence;
mod config;
mod io;
mod orientation;
mod placement;
mod record;
mod session;

pub use dartcal_core as core;

pub use board::{
    canonical_targets, polar, BoardError, BoardRadii, Ring, Target, SECTOR_ANGLE, SECTOR_ORDER,
    TARGET_COUNT,
};
pub use confidence::{confidence, ConfidenceParams};
pub use config::CalibrationConfig;
pub use io::IoError;
pub use orientation::{detect_orientation, sector_offset, wrap_angle};
pub use placement::{evaluate_placement, Placement, PlacementParams, PlacementStats};
pub use record::{CalibrationRecord, History, HISTORY_CAPACITY};
pub use session::{CalibrationSession, SessionError, SessionState};
