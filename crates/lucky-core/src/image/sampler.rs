use ndarray::Array2;

/// Resampling kernel used when reading a pixel at fractional coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Lanczos3,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Bilinear
    }
}

/// Sample `data` at fractional coordinates `(x, y)` using `interp`.
///
/// Every sampler clamps its query point into a safe sub-range before
/// reading, so this function is total for any finite `(x, y)` and any
/// non-degenerate image (`width, height >= 2 * half_support`).
pub fn sample(data: &Array2<f32>, x: f32, y: f32, interp: Interpolation) -> f32 {
    match interp {
        Interpolation::Nearest => sample_nearest(data, x, y),
        Interpolation::Bilinear => sample_bilinear(data, x, y),
        Interpolation::Lanczos3 => sample_lanczos(data, x, y, 3),
    }
}

fn sample_nearest(data: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = data.dim();
    let cx = (x.round() as isize).clamp(0, w as isize - 1) as usize;
    let cy = (y.round() as isize).clamp(0, h as isize - 1) as usize;
    data[[cy, cx]]
}

fn sample_bilinear(data: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = data.dim();
    let cx = x.clamp(1.0, (w as f32 - 2.0).max(1.0));
    let cy = y.clamp(1.0, (h as f32 - 2.0).max(1.0));

    let x0 = cx.floor() as usize;
    let y0 = cy.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = cx - x0 as f32;
    let fy = cy - y0 as f32;

    let v00 = data[[y0, x0]];
    let v10 = data[[y0, x1]];
    let v01 = data[[y1, x0]];
    let v11 = data[[y1, x1]];

    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// `sinc(x) = sin(pi x) / (pi x)`, with `sinc(0) = 1`.
fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-7 {
        1.0
    } else {
        let px = std::f32::consts::PI * x;
        px.sin() / px
    }
}

/// Lanczos kernel of order `n`: `sinc(x) * sinc(x / n)` for `|x| < n`, else 0.
fn lanczos(x: f32, n: i32) -> f32 {
    if x.abs() >= n as f32 {
        0.0
    } else {
        sinc(x) * sinc(x / n as f32)
    }
}

fn sample_lanczos(data: &Array2<f32>, x: f32, y: f32, n: i32) -> f32 {
    let (h, w) = data.dim();
    let lo = n as f32;
    let cx = x.clamp(lo, (w as f32 - lo - 1.0).max(lo));
    let cy = y.clamp(lo, (h as f32 - lo - 1.0).max(lo));

    let ix = cx.floor() as isize;
    let iy = cy.floor() as isize;

    let wx: Vec<f32> = (-n + 1..=n)
        .map(|k| lanczos(cx - (ix + k as isize) as f32, n))
        .collect();
    let wy: Vec<f32> = (-n + 1..=n)
        .map(|k| lanczos(cy - (iy + k as isize) as f32, n))
        .collect();

    // Separable accumulation, splitting positive and negative kernel
    // contributions so that a near-zero total weight (ringing near sharp
    // edges) doesn't divide out a well-conditioned numerator by a poorly
    // conditioned denominator.
    let mut sum_pos = 0.0f32;
    let mut sum_neg = 0.0f32;
    let mut wsum_pos = 0.0f32;
    let mut wsum_neg = 0.0f32;

    for (j, &wyj) in wy.iter().enumerate() {
        let row = (iy + (j as isize - (n - 1) as isize)).clamp(0, h as isize - 1) as usize;
        for (i, &wxi) in wx.iter().enumerate() {
            let col = (ix + (i as isize - (n - 1) as isize)).clamp(0, w as isize - 1) as usize;
            let weight = wxi * wyj;
            let contrib = weight * data[[row, col]];
            if weight >= 0.0 {
                sum_pos += contrib;
                wsum_pos += weight;
            } else {
                sum_neg -= contrib;
                wsum_neg -= weight;
            }
        }
    }

    let wsum = wsum_pos - wsum_neg;
    if wsum.abs() < crate::consts::EPSILON {
        sample_bilinear(data, x, y)
    } else {
        (sum_pos - sum_neg) / wsum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_exact_and_half() {
        let mut data = Array2::<f32>::zeros((4, 4));
        data[[1, 1]] = 1.0;
        assert!((sample(&data, 1.0, 1.0, Interpolation::Bilinear) - 1.0).abs() < 1e-6);
        assert!((sample(&data, 1.5, 1.0, Interpolation::Bilinear) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn lanczos_finite_everywhere_in_clamped_domain() {
        let data = Array2::<f32>::from_shape_fn((20, 20), |(r, c)| ((r + c) as f32).sin());
        for i in 0..40 {
            let t = i as f32 * 0.5;
            let v = sample(&data, t, t, Interpolation::Lanczos3);
            assert!(v.is_finite());
        }
    }

    /// Deterministic pseudo-random fraction in `[0, 1)`, avoiding a `rand`
    /// dependency for a handful of sub-pixel test offsets.
    fn pseudo_random_fraction(seed: u32) -> f32 {
        let x = seed.wrapping_mul(2654435761).wrapping_add(0x9e3779b9);
        (x % 1000) as f32 / 1000.0
    }

    /// Lanczos-3 stability (spec's "documented factor" bound): on a smooth
    /// synthetic image, Lanczos-3 must stay close to bilinear at random
    /// sub-pixel offsets, and must never be non-finite in the clamped
    /// domain. A sign error in the split positive/negative accumulation
    /// would blow this bound up by flipping every negative kernel lobe.
    #[test]
    fn lanczos_stays_within_bilinear_plus_documented_factor() {
        let data = Array2::<f32>::from_shape_fn((40, 40), |(r, c)| {
            ((r as f32 * 0.2).sin() + (c as f32 * 0.15).cos()) * 0.5
        });

        const MAX_ABS_DIFF: f32 = 0.2;

        for i in 0..50u32 {
            let x = 5.0 + pseudo_random_fraction(i) * 30.0;
            let y = 5.0 + pseudo_random_fraction(i.wrapping_add(97)) * 30.0;

            let lanczos = sample(&data, x, y, Interpolation::Lanczos3);
            let bilinear = sample(&data, x, y, Interpolation::Bilinear);

            assert!(lanczos.is_finite(), "non-finite Lanczos-3 sample at ({x}, {y})");
            assert!(
                (lanczos - bilinear).abs() < MAX_ABS_DIFF,
                "lanczos={lanczos} bilinear={bilinear} diverge by more than {MAX_ABS_DIFF} at ({x}, {y})"
            );
        }
    }

    #[test]
    fn nearest_clamps_out_of_bounds() {
        let mut data = Array2::<f32>::zeros((4, 4));
        data[[0, 0]] = 5.0;
        assert_eq!(sample(&data, -10.0, -10.0, Interpolation::Nearest), 5.0);
    }
}
