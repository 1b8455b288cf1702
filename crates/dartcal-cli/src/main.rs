//! `dartcal` command-line tool.

mod commands;

use clap::{Args, Parser, Subcommand};
#[cfg(not(feature = "tracing"))]
use dartcal::core::{init_with_level, verbosity_level};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dartcal")]
#[command(about = "Fit, inspect and use dartboard camera calibrations")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and lock a calibration from clicked target points.
    Calibrate(CalibrateArgs),

    /// Map an image pixel onto the board through a stored record.
    Map(MapArgs),

    /// Snap a rough pixel onto the strongest nearby edge of an image.
    Refine(RefineArgs),
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Points file: `{"imageSize": [w, h], "points": [{"target": "d20", "image": [x, y]}, ...]}`.
    #[arg(long)]
    points: PathBuf,

    /// Where to write the locked record (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Calibration config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// History file to append the record to (created if missing).
    #[arg(long)]
    history: Option<PathBuf>,

    /// Grayscale-convertible image used to snap every point onto an edge first.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Fit with RANSAC regardless of the config.
    #[arg(long)]
    robust: bool,
}

#[derive(Debug, Clone, Args)]
struct MapArgs {
    /// Calibration record (JSON).
    #[arg(long)]
    record: PathBuf,

    /// Calibration config, used for the ring radii.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accept a record that was never locked.
    #[arg(long)]
    allow_unlocked: bool,

    /// Pixel x.
    #[arg(allow_negative_numbers = true)]
    x: f64,

    /// Pixel y.
    #[arg(allow_negative_numbers = true)]
    y: f64,
}

#[derive(Debug, Clone, Args)]
struct RefineArgs {
    /// Input image.
    #[arg(long)]
    image: PathBuf,

    /// Search radius in pixels.
    #[arg(long, default_value_t = 6)]
    radius: u32,

    /// Pixel x.
    x: f64,

    /// Pixel y.
    y: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    #[cfg(feature = "tracing")]
    dartcal::core::init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    if let Err(err) = init_with_level(verbosity_level(cli.verbose)) {
        eprintln!("warning: logger already installed: {err}");
    }

    let result = match cli.command {
        Commands::Calibrate(args) => commands::calibrate(&args),
        Commands::Map(args) => commands::map(&args),
        Commands::Refine(args) => commands::refine(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
