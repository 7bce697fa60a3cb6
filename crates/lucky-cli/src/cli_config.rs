//! Shared CLI argument group for the configuration surface (§6) common to
//! `preview`, `align` and `integrate`. Each subcommand owns the routine
//! it runs; the option set below just builds the rest of `PipelineConfig`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lucky_core::detection::DetectionConfig;
use lucky_core::image::Interpolation;
use lucky_core::pipeline::{PipelineConfig, Routine};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InterpolationArg {
    Nearest,
    Bilinear,
    Lanczos3,
}

impl From<InterpolationArg> for Interpolation {
    fn from(value: InterpolationArg) -> Self {
        match value {
            InterpolationArg::Nearest => Interpolation::Nearest,
            InterpolationArg::Bilinear => Interpolation::Bilinear,
            InterpolationArg::Lanczos3 => Interpolation::Lanczos3,
        }
    }
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory of `.fit`/`.fits` frames; the lexicographically first is
    /// the template.
    pub input_path: PathBuf,

    /// Load the full pipeline configuration from a TOML file, overriding
    /// every other flag below.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Approximate star FWHM in pixels (1-20).
    #[arg(long, default_value = "5.0")]
    pub approx_fwhm: f32,

    /// Minimum local-mean-subtracted intensity to register as a detection.
    #[arg(long, default_value = "0.15")]
    pub min_peak: f32,

    /// Peak values at or above this are treated as saturated.
    #[arg(long, default_value = "0.9")]
    pub saturation_threshold: f32,

    /// How many worker threads to use; defaults to hardware parallelism.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Process only the first N% of frames found.
    #[arg(long, default_value = "100.0")]
    pub frame_percentage: f32,
}

impl CommonArgs {
    /// Build a `PipelineConfig` for `routine`, loading from `--config` if
    /// given; otherwise assembling one from the individual flags.
    pub fn build(&self, routine: Routine) -> anyhow::Result<PipelineConfig> {
        if let Some(ref path) = self.config {
            let contents = std::fs::read_to_string(path)?;
            let mut config: PipelineConfig = toml::from_str(&contents)?;
            config.routine = routine;
            return Ok(config);
        }

        Ok(PipelineConfig {
            routine,
            input_path: self.input_path.clone(),
            detection: DetectionConfig {
                approx_fwhm: self.approx_fwhm,
                min_peak: self.min_peak,
                saturation_threshold: self.saturation_threshold,
            },
            frame_percentage: self.frame_percentage,
            worker_count: self.workers,
            ..default_pipeline_config()
        })
    }
}

fn default_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        routine: Routine::StarDetectionPreview,
        input_path: PathBuf::new(),
        detection: DetectionConfig::default(),
        master_dark: None,
        master_flat: None,
        pedestal: 0.0,
        enable_digital_ao: false,
        star_size_rejection_threshold: 12.0,
        star_movement_rejection_threshold: 20.0,
        interpolation: Interpolation::default(),
        frame_percentage: 100.0,
        registration_only: false,
        registration_output_path: None,
        worker_count: None,
    }
}
