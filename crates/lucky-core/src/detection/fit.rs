//! 1-D Gaussian FWHM fit over a background-subtracted intensity strip.

use crate::consts::{FWHM_FIT_SIGMA_MAX, FWHM_FIT_SIGMA_MIN, FWHM_FIT_SIGMA_STEP, SIGMA_TO_FWHM};

/// Fit `g(k) = a * exp(-(k - center)^2 / (2 c^2))` to `strip`, with `a`
/// fixed to `strip[center]`, by grid search over `c`. Returns the FWHM
/// `2.35482 * c`.
///
/// `center` is the index of the peak within `strip` (normally the strip's
/// midpoint, `strip.len() / 2`).
pub fn fit_fwhm(strip: &[f32], center: usize) -> f32 {
    let amplitude = strip[center];
    if amplitude.abs() < crate::consts::EPSILON {
        return 0.0;
    }

    let mut best_sigma = FWHM_FIT_SIGMA_MIN;
    let mut best_error = f32::INFINITY;

    let mut sigma = FWHM_FIT_SIGMA_MIN;
    while sigma <= FWHM_FIT_SIGMA_MAX {
        let mut error = 0.0f32;
        for (k, &v) in strip.iter().enumerate() {
            let dk = k as f32 - center as f32;
            let predicted = amplitude * (-(dk * dk) / (2.0 * sigma * sigma)).exp();
            let diff = v - predicted;
            error += diff * diff;
        }
        if error < best_error {
            best_error = error;
            best_sigma = sigma;
        }
        sigma += FWHM_FIT_SIGMA_STEP;
    }

    SIGMA_TO_FWHM * best_sigma
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_gaussian(radius: usize, sigma: f32) -> Vec<f32> {
        let len = 2 * radius + 1;
        (0..len)
            .map(|k| {
                let dk = k as f32 - radius as f32;
                (-(dk * dk) / (2.0 * sigma * sigma)).exp()
            })
            .collect()
    }

    #[test]
    fn recovers_known_sigma() {
        let radius = 10;
        let sigma = 2.0;
        let strip = synth_gaussian(radius, sigma);
        let fwhm = fit_fwhm(&strip, radius);
        let expected = SIGMA_TO_FWHM * sigma;
        assert!(
            (fwhm - expected).abs() < 0.2,
            "fwhm={} expected={}",
            fwhm,
            expected
        );
    }

    #[test]
    fn zero_peak_returns_zero() {
        let strip = vec![0.0; 21];
        assert_eq!(fit_fwhm(&strip, 10), 0.0);
    }
}
