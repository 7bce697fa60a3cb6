use serde::{Deserialize, Serialize};

fn default_approx_fwhm() -> f32 {
    5.0
}
fn default_min_peak() -> f32 {
    0.15
}
fn default_saturation_threshold() -> f32 {
    0.9
}

/// Parameters governing template-frame star detection and per-frame
/// re-measurement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Approximate star full-width-half-maximum in pixels; sets the
    /// measurement box radius and minimum detection separation.
    #[serde(default = "default_approx_fwhm")]
    pub approx_fwhm: f32,

    /// Minimum local-mean-subtracted intensity to register as a detection.
    #[serde(default = "default_min_peak")]
    pub min_peak: f32,

    /// Peak values at or above this are treated as saturated and rejected.
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            approx_fwhm: default_approx_fwhm(),
            min_peak: default_min_peak(),
            saturation_threshold: default_saturation_threshold(),
        }
    }
}

impl DetectionConfig {
    /// Measurement box radius, `round(approx_fwhm)`.
    pub fn box_radius(&self) -> i64 {
        self.approx_fwhm.round() as i64
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if !(1.0..=20.0).contains(&self.approx_fwhm) {
            return Err(crate::error::LuckyError::Usage(format!(
                "approx_fwhm must be in [1, 20], got {}",
                self.approx_fwhm
            )));
        }
        if !(0.001..=0.5).contains(&self.min_peak) {
            return Err(crate::error::LuckyError::Usage(format!(
                "min_peak must be in [0.001, 0.5], got {}",
                self.min_peak
            )));
        }
        if !(0.1..=1.0).contains(&self.saturation_threshold) {
            return Err(crate::error::LuckyError::Usage(format!(
                "saturation_threshold must be in [0.1, 1.0], got {}",
                self.saturation_threshold
            )));
        }
        Ok(())
    }
}
