//! Inter-frame star tracking: re-measure each previously-known star in the
//! current frame, preserving its identity and list position.

use ndarray::Array2;

use crate::detection::config::DetectionConfig;
use crate::detection::fit::fit_fwhm;
use crate::frame::Star;
use crate::image::{sample, Interpolation};

fn too_close_to_border(x: f32, y: f32, w: usize, h: usize, margin: f32) -> bool {
    x < margin || y < margin || x > w as f32 - margin || y > h as f32 - margin
}

/// Re-measure every star in `previous` against the current frame `data`.
///
/// The background used for each star is **not** re-estimated: it is carried
/// over unchanged from `previous`. Stars already invalid (`peak == 0`)
/// remain invalid. Output has the same length, in the same order, as
/// `previous`.
pub fn track(previous: &[Star], data: &Array2<f32>, config: &DetectionConfig) -> Vec<Star> {
    let (h, w) = data.dim();
    let radius = config.box_radius();
    // The re-measurement window, FWHM strip half-width, and border margin
    // all share this same radius, matching the detector's `measure_radius`.
    let measure_radius = 2 * radius;
    let margin = measure_radius as f32;

    previous
        .iter()
        .map(|prev| {
            if !prev.is_valid() {
                return *prev;
            }
            if too_close_to_border(prev.x, prev.y, w, h, margin) {
                return prev.invalidated();
            }

            let bg0 = prev.background;
            let icx = prev.x.round() as i64;
            let icy = prev.y.round() as i64;

            let mut peak = f32::MIN;
            let mut mass = 0.0f32;
            let mut wx = 0.0f32;
            let mut wy = 0.0f32;

            for dr in -measure_radius..=measure_radius {
                for dc in -measure_radius..=measure_radius {
                    let rr = icy + dr;
                    let cc = icx + dc;
                    if rr < 0 || cc < 0 || rr as usize >= h || cc as usize >= w {
                        continue;
                    }
                    let v = data[[rr as usize, cc as usize]];
                    if v > peak {
                        peak = v;
                    }
                    let weight = v - bg0;
                    mass += weight;
                    wx += (cc as f32) * weight;
                    wy += (rr as f32) * weight;
                }
            }

            if mass.abs() < crate::consts::EPSILON {
                return prev.invalidated();
            }

            let cx = wx / mass;
            let cy = wy / mass;
            if too_close_to_border(cx, cy, w, h, margin) {
                return prev.invalidated();
            }

            let strip_x: Vec<f32> = (-measure_radius..=measure_radius)
                .map(|k| sample(data, cx + k as f32, cy, Interpolation::Bilinear) - bg0)
                .collect();
            let strip_y: Vec<f32> = (-measure_radius..=measure_radius)
                .map(|k| sample(data, cx, cy + k as f32, Interpolation::Bilinear) - bg0)
                .collect();
            let size_x = fit_fwhm(&strip_x, measure_radius as usize);
            let size_y = fit_fwhm(&strip_y, measure_radius as usize);

            Star {
                id: prev.id,
                x: cx,
                y: cy,
                background: bg0,
                peak,
                size_x,
                size_y,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn gaussian_at(w: usize, h: usize, sx: f32, sy: f32, sigma: f32) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(r, c)| {
            let dx = c as f32 - sx;
            let dy = r as f32 - sy;
            (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
        })
    }

    #[test]
    fn preserves_identity_and_count() {
        let config = DetectionConfig {
            approx_fwhm: 5.0,
            min_peak: 0.1,
            saturation_threshold: 0.95,
        };
        let stars = vec![Star {
            id: 0,
            x: 40.0,
            y: 40.0,
            background: 0.0,
            peak: 1.0,
            size_x: 4.7,
            size_y: 4.7,
        }];
        let data = gaussian_at(80, 80, 41.0, 40.0, 2.0);
        let tracked = track(&stars, &data, &config);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].id, 0);
        assert!(tracked[0].is_valid());
        assert!((tracked[0].x - 41.0).abs() < 0.3);
    }

    #[test]
    fn invalidates_star_too_close_to_border() {
        let config = DetectionConfig {
            approx_fwhm: 5.0,
            min_peak: 0.1,
            saturation_threshold: 0.95,
        };
        let stars = vec![Star {
            id: 0,
            x: 2.0,
            y: 2.0,
            background: 0.0,
            peak: 1.0,
            size_x: 4.7,
            size_y: 4.7,
        }];
        let data = Array2::<f32>::zeros((80, 80));
        let tracked = track(&stars, &data, &config);
        assert!(!tracked[0].is_valid());
    }
}
