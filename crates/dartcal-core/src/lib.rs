//! Projective-geometry core for dartboard camera calibration.
//!
//! This crate is intentionally small and purely numeric. It knows nothing
//! about dartboards beyond "a plane measured in millimeters": the board model,
//! scoring and session handling live in the `dartcal` crate.
//!
//! Provided here:
//! - typed board-space / image-space points,
//! - homography estimation (normalized DLT) and a seeded RANSAC wrapper,
//! - forward / inverse mapping and RMS reprojection error,
//! - a Sobel edge-snap refiner over a borrowed grayscale buffer,
//! - a minimal stderr logger (and `tracing` setup behind a feature).

mod error;
mod homography;
mod image;
mod logger;
mod mapping;
mod points;
mod ransac;
mod refine;

pub use error::{Degeneracy, HomographyError};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView, ImageError};
pub use mapping::{board_to_image, image_to_board, reprojection_errors, rms_error};
pub use points::{BoardPoint, Correspondence, ImagePoint};
pub use ransac::{
    estimate_homography_ransac, estimate_homography_ransac_cancellable, RansacParams, RobustFit,
    MIN_SAMPLE_SIZE,
};
pub use refine::{refine_point, refine_point_with, sobel_magnitude, RefineParams};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, verbosity_level};
