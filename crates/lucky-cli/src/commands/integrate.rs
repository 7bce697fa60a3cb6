use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use lucky_core::io;
use lucky_core::pipeline::{self, PipelineOutcome, Routine};
use lucky_core::pool::AbortFlag;

use crate::abort::install_ctrlc;
use crate::cli_config::{CommonArgs, InterpolationArg};
use crate::progress::BarReporter;

/// Calibrate, register and integrate every selected frame, reading star
/// positions from the `star_detections.xml` handoff (run `align` first).
#[derive(Args)]
pub struct IntegrateArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Optional master dark frame.
    #[arg(long)]
    pub master_dark: Option<PathBuf>,

    /// Optional master flat frame.
    #[arg(long)]
    pub master_flat: Option<PathBuf>,

    /// Added to every pixel after dark subtraction (0-0.01).
    #[arg(long, default_value = "0.0")]
    pub pedestal: f32,

    /// Per-pixel spatially-varying registration instead of a single global
    /// displacement.
    #[arg(long)]
    pub digital_ao: bool,

    /// Resampling kernel.
    #[arg(long, value_enum, default_value = "bilinear")]
    pub interpolation: InterpolationArg,

    /// Drop frames whose mean star FWHM exceeds this many pixels.
    #[arg(long, default_value = "12.0")]
    pub star_size_threshold: f32,

    /// Drop frames whose inter-frame star motion exceeds this many pixels.
    #[arg(long, default_value = "20.0")]
    pub star_movement_threshold: f32,

    /// Write each registered frame independently instead of integrating.
    #[arg(long)]
    pub registration_only: bool,

    /// Output directory for `--registration-only`.
    #[arg(long)]
    pub registration_output_path: Option<PathBuf>,

    /// Output path for the integrated image (FITS).
    #[arg(short, long, default_value = "integration.fits")]
    pub output: PathBuf,
}

pub fn run(args: &IntegrateArgs) -> Result<()> {
    let mut config = args.common.build(Routine::ImageIntegration)?;
    config.master_dark = args.master_dark.clone();
    config.master_flat = args.master_flat.clone();
    config.pedestal = args.pedestal;
    config.enable_digital_ao = args.digital_ao;
    config.interpolation = args.interpolation.into();
    config.star_size_rejection_threshold = args.star_size_threshold;
    config.star_movement_rejection_threshold = args.star_movement_threshold;
    config.registration_only = args.registration_only;
    config.registration_output_path = args.registration_output_path.clone();

    let abort = Arc::new(AbortFlag::new());
    let _ctrlc = install_ctrlc(&abort);
    let reporter = BarReporter::new();

    let outcome = pipeline::execute(&config, &reporter, &abort)?;
    match outcome {
        PipelineOutcome::Integration {
            image,
            num_total,
            num_integrated,
        } => {
            io::save_fits(&image, &args.output)?;
            println!(
                "{} {}/{} frame(s) integrated -> {}",
                style("done").green().bold(),
                num_integrated,
                num_total,
                args.output.display()
            );
        }
        PipelineOutcome::RegistrationOnly {
            num_total,
            num_written,
        } => {
            println!(
                "{} {}/{} frame(s) registered",
                style("done").green().bold(),
                num_written,
                num_total
            );
        }
        _ => unreachable!("ImageIntegration always returns Integration or RegistrationOnly"),
    }
    Ok(())
}
