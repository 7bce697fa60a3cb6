//! Cosmetic correction: replace 3x3 neighbourhood outliers.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{COSMETIC_SIGMA_MULT, PARALLEL_PIXEL_THRESHOLD};

/// Mean and variance of the 3x3 neighbourhood around `(r, c)`, clipped at
/// image borders (only in-bounds neighbours contribute).
fn neighborhood_stats(data: &Array2<f32>, r: usize, c: usize) -> (f32, f32) {
    let (h, w) = data.dim();
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0.0f32;

    let r0 = r.saturating_sub(1);
    let r1 = (r + 1).min(h - 1);
    let c0 = c.saturating_sub(1);
    let c1 = (c + 1).min(w - 1);

    for rr in r0..=r1 {
        for cc in c0..=c1 {
            if rr == r && cc == c {
                continue;
            }
            let v = data[[rr, cc]];
            sum += v;
            sum_sq += v * v;
            count += 1.0;
        }
    }

    if count == 0.0 {
        return (data[[r, c]], 0.0);
    }
    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);
    (mean, variance)
}

fn median_of_neighbors(data: &Array2<f32>, r: usize, c: usize) -> f32 {
    let (h, w) = data.dim();
    let r0 = r.saturating_sub(1);
    let r1 = (r + 1).min(h - 1);
    let c0 = c.saturating_sub(1);
    let c1 = (c + 1).min(w - 1);

    let mut values: Vec<f32> = Vec::with_capacity(9);
    for rr in r0..=r1 {
        for cc in c0..=c1 {
            if rr == r && cc == c {
                continue;
            }
            values.push(data[[rr, cc]]);
        }
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("finite pixel value"));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 && !values.is_empty() {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Run cosmetic correction on `src`, returning a corrected copy.
///
/// Outliers (`(v - mean)^2 > 4 * variance` over the 3x3 neighbourhood) are
/// replaced with the neighbourhood median when `invalidate` is `false`, or
/// with `NaN` when `invalidate` is `true`. Downstream samplers must treat
/// `NaN` as "no data" rather than propagate it.
pub fn correct(src: &Array2<f32>, invalidate: bool) -> Array2<f32> {
    let (h, w) = src.dim();
    let mut out = src.clone();

    let compute = |r: usize, c: usize| -> f32 {
        let v = src[[r, c]];
        let (mean, variance) = neighborhood_stats(src, r, c);
        let diff = v - mean;
        if diff * diff > COSMETIC_SIGMA_MULT * variance {
            if invalidate {
                f32::NAN
            } else {
                median_of_neighbors(src, r, c)
            }
        } else {
            v
        }
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        out.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut row)| {
                for c in 0..w {
                    row[c] = compute(r, c);
                }
            });
    } else {
        for r in 0..h {
            for c in 0..w {
                out[[r, c]] = compute(r, c);
            }
        }
    }
    out
}
