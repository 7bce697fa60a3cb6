use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::DetectionConfig;
use crate::error::{LuckyError, Result};
use crate::image::Interpolation;

/// Which of the three routines `execute` runs (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Routine {
    /// Detect stars on frame 0 only; no tracking, no registration.
    StarDetectionPreview,
    /// Detect on frame 0, track every later frame, persist the XML handoff.
    StarDetectionAlignment,
    /// Full pipeline: detection/tracking, then calibrated registration and
    /// either integration or per-frame registration-only output.
    ImageIntegration,
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Routine::StarDetectionPreview => write!(f, "Star Detection Preview"),
            Routine::StarDetectionAlignment => write!(f, "Star Detection Alignment"),
            Routine::ImageIntegration => write!(f, "Image Integration"),
        }
    }
}

fn default_pedestal() -> f32 {
    0.0
}
fn default_star_size_threshold() -> f32 {
    12.0
}
fn default_star_movement_threshold() -> f32 {
    20.0
}
fn default_frame_percentage() -> f32 {
    100.0
}

/// The full configuration surface (§6), plus the `worker_count` ambient
/// addition. `Clone + Debug`, `Send + Sync` (holds no I/O handles), built
/// either programmatically or via `serde`/`toml`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub routine: Routine,

    /// Directory of `.fit`/`.fits` input frames.
    pub input_path: PathBuf,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub master_dark: Option<PathBuf>,
    #[serde(default)]
    pub master_flat: Option<PathBuf>,

    #[serde(default = "default_pedestal")]
    pub pedestal: f32,

    #[serde(default)]
    pub enable_digital_ao: bool,

    #[serde(default = "default_star_size_threshold")]
    pub star_size_rejection_threshold: f32,

    #[serde(default = "default_star_movement_threshold")]
    pub star_movement_rejection_threshold: f32,

    #[serde(default)]
    pub interpolation: Interpolation,

    #[serde(default = "default_frame_percentage")]
    pub frame_percentage: f32,

    #[serde(default)]
    pub registration_only: bool,

    #[serde(default)]
    pub registration_output_path: Option<PathBuf>,

    /// Defaults to `std::thread::available_parallelism()` when `None`.
    #[serde(default)]
    pub worker_count: Option<usize>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(LuckyError::Usage("input_path is required".to_string()));
        }
        self.detection.validate()?;

        if !(0.0..=0.01).contains(&self.pedestal) {
            return Err(LuckyError::Usage(format!(
                "pedestal must be in [0, 0.01], got {}",
                self.pedestal
            )));
        }
        if !(1.0..=30.0).contains(&self.star_size_rejection_threshold) {
            return Err(LuckyError::Usage(format!(
                "star_size_rejection_threshold must be in [1, 30], got {}",
                self.star_size_rejection_threshold
            )));
        }
        if !(1.0..=100.0).contains(&self.star_movement_rejection_threshold) {
            return Err(LuckyError::Usage(format!(
                "star_movement_rejection_threshold must be in [1, 100], got {}",
                self.star_movement_rejection_threshold
            )));
        }
        if !(0.0..=100.0).contains(&self.frame_percentage) {
            return Err(LuckyError::Usage(format!(
                "frame_percentage must be in [0, 100], got {}",
                self.frame_percentage
            )));
        }
        if self.registration_only && self.registration_output_path.is_none() {
            return Err(LuckyError::Usage(
                "registration_output_path is required when registration_only is set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            routine: Routine::ImageIntegration,
            input_path: PathBuf::new(),
            detection: DetectionConfig::default(),
            master_dark: None,
            master_flat: None,
            pedestal: default_pedestal(),
            enable_digital_ao: false,
            star_size_rejection_threshold: default_star_size_threshold(),
            star_movement_rejection_threshold: default_star_movement_threshold(),
            interpolation: Interpolation::default(),
            frame_percentage: default_frame_percentage(),
            registration_only: false,
            registration_output_path: None,
            worker_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input_path() {
        let config = PipelineConfig {
            input_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_registration_only_without_output_path() {
        let config = PipelineConfig {
            input_path: PathBuf::from("/tmp/frames"),
            registration_only: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_is_valid_once_input_path_is_set() {
        let config = PipelineConfig {
            input_path: PathBuf::from("/tmp/frames"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
