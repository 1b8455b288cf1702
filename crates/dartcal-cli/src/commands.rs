use crate::{CalibrateArgs, MapArgs, RefineArgs};
use dartcal::core::{image_to_board, refine_point, GrayImageView, ImagePoint};
use dartcal::{
    CalibrationConfig, CalibrationRecord, CalibrationSession, History, IoError, Ring,
    SessionError, Target,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] IoError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Gray(#[from] dartcal::core::ImageError),
    #[error("record is not locked (pass --allow-unlocked to use it anyway)")]
    Unlocked,
    #[error("pixel ({x}, {y}) does not map onto the board plane")]
    Unmappable { x: f64, y: f64 },
}

/// One clicked target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetPoint {
    pub target: Target,
    pub image: ImagePoint,
}

/// Input of `dartcal calibrate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsFile {
    #[serde(default)]
    pub image_size: [u32; 2],
    #[serde(default)]
    pub overlay_size: [u32; 2],
    pub points: Vec<TargetPoint>,
}

/// Output of `dartcal map`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedPoint {
    pub board: [f64; 2],
    pub radius_mm: f64,
    pub ring: Ring,
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig, CliError> {
    match path {
        Some(path) => Ok(CalibrationConfig::load_json(path)?),
        None => Ok(CalibrationConfig::default()),
    }
}

fn load_gray(path: &Path) -> Result<image::GrayImage, CliError> {
    Ok(image::open(path)?.to_luma8())
}

fn view(img: &image::GrayImage) -> Result<GrayImageView<'_>, CliError> {
    Ok(GrayImageView::new(
        img.width() as usize,
        img.height() as usize,
        img.as_raw(),
    )?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn calibrate(args: &CalibrateArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if args.robust {
        config.robust = true;
    }
    let input: PointsFile = serde_json::from_str(&fs::read_to_string(&args.points)?)?;

    let history = match &args.history {
        Some(path) => History::load_json(path)?,
        None => History::new(),
    };
    let mut session = CalibrationSession::new(config)?
        .with_frame_sizes(input.image_size, input.overlay_size)
        .with_history(history);

    let gray = args.image.as_deref().map(load_gray).transpose()?;
    for p in &input.points {
        match &gray {
            Some(img) => {
                session.add_point_refined(p.target, p.image, &view(img)?)?;
            }
            None => {
                session.add_point(p.target, p.image)?;
            }
        }
    }

    if let Some(err) = session.last_error() {
        warn!("fit failed: {err}");
    }
    for placement in session.placements().iter().filter(|p| !p.is_valid) {
        warn!(
            "{} looks misplaced (radius {:?} mm, miss {:?} mm)",
            placement.target, placement.radius_mm, placement.board_miss_mm
        );
    }

    let record = session.lock()?.clone();
    info!(
        "rms {:.3}px, confidence {:.1}",
        record.error_px, record.confidence
    );

    if let Some(path) = &args.history {
        session.history().write_json(path)?;
    }
    match &args.out {
        Some(path) => record.write_json(path)?,
        None => print_json(&record)?,
    }
    Ok(())
}

pub(crate) fn map(args: &MapArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let record = CalibrationRecord::load_json(&args.record)?;
    if !record.is_active() && !args.allow_unlocked {
        return Err(CliError::Unlocked);
    }

    let pixel = ImagePoint::new(args.x, args.y);
    let board = image_to_board(&record.h, pixel).ok_or(CliError::Unmappable {
        x: args.x,
        y: args.y,
    })?;
    let radius_mm = board.radius();
    print_json(&MappedPoint {
        board: board.into(),
        radius_mm,
        ring: config.radii.ring_at(radius_mm),
    })
}

pub(crate) fn refine(args: &RefineArgs) -> Result<(), CliError> {
    let gray = load_gray(&args.image)?;
    let rough = ImagePoint::new(args.x, args.y);
    let refined = refine_point(&view(&gray)?, rough, args.radius);
    info!(
        "({:.1}, {:.1}) -> ({:.1}, {:.1})",
        rough.x, rough.y, refined.x, refined.y
    );
    print_json(&refined)
}
