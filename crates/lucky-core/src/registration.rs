//! Calibration, displacement estimation and resampling: the per-frame work
//! done by the registration/integration stage (§4.6).

use ndarray::Array2;

use crate::frame::{Displacement, Star};
use crate::image::{self, sample, Interpolation};

/// Optional dark/flat calibration frames, plus the additive pedestal
/// applied after dark subtraction.
#[derive(Clone, Debug, Default)]
pub struct Calibration {
    pub master_dark: Option<Array2<f32>>,
    pub master_flat: Option<Array2<f32>>,
    /// Mean pixel value of `master_flat`, precomputed once.
    pub flat_mean: Option<f32>,
    pub pedestal: f32,
}

impl Calibration {
    pub fn with_flat(mut self, flat: Array2<f32>) -> Self {
        let mean = flat.iter().sum::<f32>() / flat.len() as f32;
        self.flat_mean = Some(mean);
        self.master_flat = Some(flat);
        self
    }

    /// Calibrate `raw` into a fresh buffer: subtract the dark (then add the
    /// pedestal) if present, divide by the flat (then multiply by its mean)
    /// if present.
    pub fn apply(&self, raw: &Array2<f32>) -> Array2<f32> {
        let mut out = raw.clone();
        if let Some(ref dark) = self.master_dark {
            image::sub_into(&mut out, dark);
            image::add_scalar(&mut out, self.pedestal);
        }
        if let (Some(ref flat), Some(mean)) = (&self.master_flat, self.flat_mean) {
            image::div_into_guarded(&mut out, flat);
            image::mul_scalar(&mut out, mean);
        }
        out
    }
}

/// `true` for a star valid in the current measurement (`peak > 0`).
fn is_valid(star: &Star) -> bool {
    star.peak > 0.0
}

/// Global displacement of frame `current` relative to the `template`
/// (frame 0) star list: mean of `(current[k] - template[k])` over stars
/// valid in `current`.
///
/// Per a documented deviation from a naive mean (§9 of the design notes),
/// the divisor is `current.len()` (every star slot, including invalidated
/// ones), not the count of valid stars. This crate preserves that observed
/// behaviour rather than silently correcting it.
pub fn global_displacement(current: &[Star], template: &[Star]) -> Displacement {
    if current.is_empty() {
        return Displacement::ZERO;
    }
    let mut sum = Displacement::ZERO;
    for (cur, tmpl) in current.iter().zip(template.iter()) {
        if is_valid(cur) {
            sum = sum + Displacement::new(cur.x - tmpl.x, cur.y - tmpl.y);
        }
    }
    let n = current.len() as f32;
    Displacement::new(sum.dx / n, sum.dy / n)
}

/// Inter-frame motion of `current` relative to `previous`: mean of
/// `(current[k] - previous[k])` over stars valid in `current`.
///
/// Same documented deviation as [`global_displacement`]: gated only on the
/// current frame's validity (not `previous`'s), and divided by
/// `current.len()` rather than the valid-star count.
pub fn inter_frame_motion(current: &[Star], previous: &[Star]) -> Displacement {
    if current.is_empty() {
        return Displacement::ZERO;
    }
    let mut sum = Displacement::ZERO;
    for (cur, prev) in current.iter().zip(previous.iter()) {
        if is_valid(cur) {
            sum = sum + Displacement::new(cur.x - prev.x, cur.y - prev.y);
        }
    }
    let n = current.len() as f32;
    Displacement::new(sum.dx / n, sum.dy / n)
}

/// Mean FWHM (`sizeX`, `sizeY`) over stars valid in `current`.
///
/// Same documented deviation: divided by `current.len()`, not the valid-star
/// count; `(0, 0)` for an empty list.
pub fn mean_star_size(current: &[Star]) -> (f32, f32) {
    if current.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum_x = 0.0f32;
    let mut sum_y = 0.0f32;
    for star in current {
        if is_valid(star) {
            sum_x += star.size_x;
            sum_y += star.size_y;
        }
    }
    let n = current.len() as f32;
    (sum_x / n, sum_y / n)
}

/// `true` if this frame's seeing is bad enough to reject: the larger of the
/// mean `sizeX`/`sizeY` exceeds `threshold`.
pub fn exceeds_seeing_threshold(current: &[Star], threshold: f32) -> bool {
    let (mean_x, mean_y) = mean_star_size(current);
    mean_x.max(mean_y) > threshold
}

/// `true` if this frame's tracking error is bad enough to reject: the
/// inter-frame motion magnitude exceeds `threshold`.
pub fn exceeds_movement_threshold(motion: Displacement, threshold: f32) -> bool {
    motion.magnitude() > threshold
}

/// Resample `data` with a single global displacement applied uniformly:
/// output pixel `(x, y)` reads source `(x + d.dx, y + d.dy)`.
pub fn resample_uniform(data: &Array2<f32>, d: Displacement, interp: Interpolation) -> Array2<f32> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h, w), |(r, c)| {
        sample(data, c as f32 + d.dx, r as f32 + d.dy, interp)
    })
}

/// Digital-AO resampling: every output pixel gets its own displacement,
/// the distance-weighted average of every valid star's displacement
/// relative to the template. `w_k = 1 / (dist_k^2 + 1)`.
pub fn resample_digital_ao(
    data: &Array2<f32>,
    current: &[Star],
    template: &[Star],
    interp: Interpolation,
) -> Array2<f32> {
    let (h, w) = data.dim();

    let valid: Vec<(f32, f32, f32, f32)> = current
        .iter()
        .zip(template.iter())
        .filter(|(cur, _)| is_valid(cur))
        .map(|(cur, tmpl)| (cur.x, cur.y, cur.x - tmpl.x, cur.y - tmpl.y))
        .collect();

    if valid.is_empty() {
        return data.clone();
    }

    Array2::from_shape_fn((h, w), |(r, c)| {
        let x = c as f32;
        let y = r as f32;
        let mut wsum = 0.0f32;
        let mut dx = 0.0f32;
        let mut dy = 0.0f32;
        for &(sx, sy, ddx, ddy) in &valid {
            let dist_sq = (sx - x) * (sx - x) + (sy - y) * (sy - y);
            let weight = 1.0 / (dist_sq + 1.0);
            wsum += weight;
            dx += weight * ddx;
            dy += weight * ddy;
        }
        let (dx, dy) = if wsum > 0.0 {
            (dx / wsum, dy / wsum)
        } else {
            (0.0, 0.0)
        };
        sample(data, x + dx, y + dy, interp)
    })
}

/// Running sum of registered frames plus how many were accumulated,
/// mergeable across worker-local accumulators (commutative/associative).
#[derive(Clone, Debug)]
pub struct Accumulator {
    pub sum: Array2<f32>,
    pub count: usize,
}

impl Accumulator {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            sum: Array2::zeros((height, width)),
            count: 0,
        }
    }

    pub fn add(&mut self, frame: &Array2<f32>) {
        image::add_into(&mut self.sum, frame);
        self.count += 1;
    }

    pub fn merge(&mut self, other: &Accumulator) {
        image::add_into(&mut self.sum, &other.sum);
        self.count += other.count;
    }

    /// Finalise into the published integration image: divide by count,
    /// clip to `[0, 1]`.
    pub fn finalize(&self) -> Array2<f32> {
        let mut out = self.sum.clone();
        if self.count > 0 {
            image::div_scalar(&mut out, self.count as f32);
        }
        image::clip(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(id: usize, x: f32, y: f32, peak: f32) -> Star {
        Star {
            id,
            x,
            y,
            background: 0.0,
            peak,
            size_x: 4.0,
            size_y: 4.0,
        }
    }

    #[test]
    fn global_displacement_divides_by_total_slots_not_valid_count() {
        let template = vec![star(0, 10.0, 10.0, 1.0), star(1, 20.0, 20.0, 1.0)];
        // second star invalidated in the current frame
        let current = vec![star(0, 11.0, 10.0, 1.0), star(1, 0.0, 0.0, 0.0)];
        let d = global_displacement(&current, &template);
        // sum of valid diffs = (1,0); divided by len()=2, not valid-count=1
        assert!((d.dx - 0.5).abs() < 1e-5);
        assert!((d.dy - 0.0).abs() < 1e-5);
    }

    #[test]
    fn inter_frame_motion_zero_when_current_invalid() {
        let previous = vec![star(0, 10.0, 10.0, 1.0)];
        let current = vec![star(0, 11.0, 10.0, 0.0)];
        let d = inter_frame_motion(&current, &previous);
        assert_eq!(d, Displacement::ZERO);
    }

    #[test]
    fn inter_frame_motion_divides_by_total_slots_not_valid_count() {
        let previous = vec![star(0, 10.0, 10.0, 1.0), star(1, 20.0, 20.0, 1.0)];
        // second star invalid in current; previous's validity is irrelevant
        let current = vec![star(0, 11.0, 10.0, 1.0), star(1, 0.0, 0.0, 0.0)];
        let d = inter_frame_motion(&current, &previous);
        assert!((d.dx - 0.5).abs() < 1e-5);
        assert!((d.dy - 0.0).abs() < 1e-5);
    }

    #[test]
    fn calibration_subtracts_dark_and_divides_flat() {
        let dark = Array2::from_elem((2, 2), 0.1f32);
        let mut flat = Array2::from_elem((2, 2), 0.5f32);
        flat[[0, 0]] = 1.0;
        let calib = Calibration {
            master_dark: Some(dark),
            pedestal: 0.0,
            ..Default::default()
        }
        .with_flat(flat);

        let raw = Array2::from_elem((2, 2), 0.2f32);
        let out = calib.apply(&raw);
        // (0.2 - 0.1) / flat * flat_mean
        assert!((out[[1, 1]] - 0.1).abs() < 1e-5); // flat=0.5==mean -> unchanged
        assert!(out[[0, 0]] < out[[1, 1]]); // flat=1.0 > mean -> darkened
    }

    #[test]
    fn uniform_resample_zero_displacement_is_identity() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r + c) as f32);
        let out = resample_uniform(&data, Displacement::ZERO, Interpolation::Nearest);
        assert_eq!(data, out);
    }
}
