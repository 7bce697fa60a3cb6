//! The image buffer layer: a 2-D float array with samplers and pixel
//! arithmetic. The buffer type itself is just `ndarray::Array2<f32>`;
//! this module supplies the operations the rest of the crate needs on it.

mod sampler;

pub use sampler::{sample, Interpolation};

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Clip every pixel into `[0, 1]` in place.
pub fn clip(data: &mut Array2<f32>) {
    if data.len() >= PARALLEL_PIXEL_THRESHOLD {
        data.as_slice_mut()
            .expect("contiguous buffer")
            .par_iter_mut()
            .for_each(|v| *v = v.clamp(0.0, 1.0));
    } else {
        data.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
    }
}

/// Add `scalar` to every pixel in place.
pub fn add_scalar(data: &mut Array2<f32>, scalar: f32) {
    data.iter_mut().for_each(|v| *v += scalar);
}

/// Multiply every pixel by `scalar` in place.
pub fn mul_scalar(data: &mut Array2<f32>, scalar: f32) {
    data.iter_mut().for_each(|v| *v *= scalar);
}

/// Divide every pixel by `scalar` in place. No-op if `scalar` is ~0.
pub fn div_scalar(data: &mut Array2<f32>, scalar: f32) {
    if scalar.abs() < crate::consts::EPSILON {
        return;
    }
    data.iter_mut().for_each(|v| *v /= scalar);
}

/// `dst -= src`, element-wise. Panics if shapes differ.
pub fn sub_into(dst: &mut Array2<f32>, src: &Array2<f32>) {
    assert_eq!(dst.dim(), src.dim(), "buffer shape mismatch");
    *dst -= src;
}

/// `dst /= src`, element-wise, skipping (leaving unchanged) any pixel where
/// `src` is ~0. Panics if shapes differ.
pub fn div_into_guarded(dst: &mut Array2<f32>, src: &Array2<f32>) {
    assert_eq!(dst.dim(), src.dim(), "buffer shape mismatch");
    ndarray::Zip::from(dst).and(src).for_each(|d, &s| {
        if s.abs() > crate::consts::EPSILON {
            *d /= s;
        }
    });
}

/// `dst += src`, element-wise. Panics if shapes differ.
pub fn add_into(dst: &mut Array2<f32>, src: &Array2<f32>) {
    assert_eq!(dst.dim(), src.dim(), "buffer shape mismatch");
    *dst += src;
}
