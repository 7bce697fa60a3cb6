/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// B3 spline 1D kernel coefficients: [1, 4, 6, 4, 1] / 16.
pub const B3_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Number of wavelet detail layers computed by the background estimator;
/// only the residual (layer 6) survives reconstruction.
pub const BACKGROUND_WAVELET_LAYERS: usize = 6;

/// Cosmetic correction outlier test: `(v - mean)^2 > COSMETIC_SIGMA_MULT * variance`.
pub const COSMETIC_SIGMA_MULT: f32 = 4.0;

/// 5x5 majority filter: a pixel survives binarisation if at least this many
/// of its 25 neighbours (including itself) exceed the local threshold.
pub const MAJORITY_FILTER_MIN_VOTES: usize = 5;

/// Multiplier applied to `approx_fwhm` to get the minimum allowed star size.
pub const MIN_STAR_SIZE_FRACTION: f32 = 0.5;

/// Multiplier applied to `approx_fwhm` for the minimum allowed separation
/// between two distinct detections.
pub const STAR_PROXIMITY_FACTOR: f32 = 4.0;

/// Search range and step for the 1-D Gaussian FWHM fit (in sigma units).
pub const FWHM_FIT_SIGMA_MIN: f32 = 0.1;
pub const FWHM_FIT_SIGMA_MAX: f32 = 20.0;
pub const FWHM_FIT_SIGMA_STEP: f32 = 0.1;

/// Conversion factor from Gaussian sigma to full width at half maximum.
pub const SIGMA_TO_FWHM: f32 = 2.35482;

/// Interval, in milliseconds, between legacy poll attempts. Kept only as a
/// documented upper bound: the condvar-based wait this crate uses is exact
/// rather than polled, but tests rely on forward progress within this bound.
pub const DETECTION_WAIT_POLL_MS: u64 = 1;

/// Star-detection XML handoff format version.
pub const STAR_DETECTION_XML_VERSION: &str = "1.0";
