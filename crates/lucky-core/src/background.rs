//! Background extraction via an a-trous (B3-spline) multiscale wavelet.
//!
//! The template frame is decomposed into [`BACKGROUND_WAVELET_LAYERS`] detail
//! layers plus a residual; the background image is the reconstruction using
//! only the residual, i.e. every detail layer's contribution is dropped.
//! This keeps only the coarsest spatial scale, which is exactly what a
//! background estimate needs.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{BACKGROUND_WAVELET_LAYERS, B3_KERNEL, PARALLEL_PIXEL_THRESHOLD};
use crate::image;

/// Mirror an index into `[0, len)` by reflecting at the boundary.
fn mirror_index(i: isize, len: usize) -> usize {
    let len = len as isize;
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// Convolve rows with the dilated B3 kernel at scale `step = 2^layer`.
fn convolve_rows(src: &Array2<f32>, step: isize) -> Array2<f32> {
    let (h, w) = src.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    let rows: Vec<_> = (0..h).collect();
    let compute_row = |r: usize, out_row: &mut [f32]| {
        for c in 0..w {
            let mut acc = 0.0f32;
            for (k, &coeff) in B3_KERNEL.iter().enumerate() {
                let offset = (k as isize - 2) * step;
                let cc = mirror_index(c as isize + offset, w);
                acc += coeff * src[[r, cc]];
            }
            out_row[c] = acc;
        }
    };
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        out.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .zip(rows.par_iter())
            .for_each(|(mut out_row, &r)| {
                compute_row(r, out_row.as_slice_mut().expect("contiguous row"));
            });
    } else {
        for &r in &rows {
            let mut row = vec![0.0f32; w];
            compute_row(r, &mut row);
            for (c, v) in row.into_iter().enumerate() {
                out[[r, c]] = v;
            }
        }
    }
    out
}

/// Convolve columns with the dilated B3 kernel at scale `step = 2^layer`.
fn convolve_cols(src: &Array2<f32>, step: isize) -> Array2<f32> {
    let (h, w) = src.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    for r in 0..h {
        for c in 0..w {
            let mut acc = 0.0f32;
            for (k, &coeff) in B3_KERNEL.iter().enumerate() {
                let offset = (k as isize - 2) * step;
                let rr = mirror_index(r as isize + offset, h);
                acc += coeff * src[[rr, c]];
            }
            out[[r, c]] = acc;
        }
    }
    out
}

fn atrous_smooth(src: &Array2<f32>, layer: usize) -> Array2<f32> {
    let step = 1isize << layer;
    let horiz = convolve_rows(src, step);
    convolve_cols(&horiz, step)
}

/// Decompose `src` into `BACKGROUND_WAVELET_LAYERS` detail layers plus a
/// residual: `src = sum(details) + residual`.
fn decompose(src: &Array2<f32>) -> (Vec<Array2<f32>>, Array2<f32>) {
    let mut details = Vec::with_capacity(BACKGROUND_WAVELET_LAYERS);
    let mut current = src.clone();
    for layer in 0..BACKGROUND_WAVELET_LAYERS {
        let smoothed = atrous_smooth(&current, layer);
        let detail = &current - &smoothed;
        details.push(detail);
        current = smoothed;
    }
    (details, current)
}

/// Extract the background image from the template frame: a 6-level
/// multiscale wavelet reconstruction keeping only the residual (coarsest
/// scale), with all detail layers zeroed, clipped to `[0, 1]`.
pub fn extract_background(template: &Array2<f32>) -> Array2<f32> {
    let (_details, residual) = decompose(template);
    let mut background = residual;
    image::clip(&mut background);
    background
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_image_reconstructs_to_itself() {
        let src = Array2::<f32>::from_elem((64, 64), 0.5);
        let bg = extract_background(&src);
        for v in bg.iter() {
            assert!((v - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn removes_fine_structure() {
        let mut src = Array2::<f32>::from_elem((64, 64), 0.2);
        src[[32, 32]] = 1.0;
        let bg = extract_background(&src);
        // A single bright pixel is fine-scale detail; the background should
        // be close to the surrounding level, not the spike.
        assert!(bg[[32, 32]] < 0.5);
    }
}
