//! Synthetic-frame builders shared by the end-to-end scenario tests in
//! this directory: Gaussian star fields, shifted copies, and a thin
//! wrapper around the crate's own FITS writer so each test can build a
//! throwaway `tests/frames/*.fits` directory without hand-rolling the
//! file format.

use std::path::{Path, PathBuf};

use ndarray::Array2;

use lucky_core::frame::Frame;
use lucky_core::io;

/// Render a sum of circular Gaussians of the given `sigma`/`amp` onto a
/// `w x h` field, each centred at its `(x, y)` in `stars`.
pub fn gaussian_field(w: usize, h: usize, stars: &[(f32, f32)], sigma: f32, amp: f32) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let mut v = 0.0f32;
        for &(sx, sy) in stars {
            let dx = c as f32 - sx;
            let dy = r as f32 - sy;
            v += amp * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
        v
    })
}

/// The same field as [`gaussian_field`], with every star shifted by
/// `(dx, dy)`.
pub fn shifted_gaussian_field(
    w: usize,
    h: usize,
    stars: &[(f32, f32)],
    sigma: f32,
    amp: f32,
    dx: f32,
    dy: f32,
) -> Array2<f32> {
    let shifted: Vec<(f32, f32)> = stars.iter().map(|&(x, y)| (x + dx, y + dy)).collect();
    gaussian_field(w, h, &shifted, sigma, amp)
}

/// Write `data` as a float32 FITS frame at `dir/name`, returning its path.
pub fn write_fits(dir: &Path, name: &str, data: Array2<f32>) -> PathBuf {
    let path = dir.join(name);
    io::save_fits(&Frame::new(data, 32, 0), &path).expect("write synthetic FITS frame");
    path
}

/// Five well-separated star centres used by the preview/alignment
/// scenario tests below.
pub const FIVE_STAR_CENTERS: [(f32, f32); 5] =
    [(20.0, 20.0), (60.0, 20.0), (100.0, 20.0), (20.0, 100.0), (100.0, 100.0)];
