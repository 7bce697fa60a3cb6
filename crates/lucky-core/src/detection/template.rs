//! Template-frame star detection: the one-time pass over frame 0 that
//! assigns every star its identity for the rest of the run.

use ndarray::Array2;

use crate::consts::{MAJORITY_FILTER_MIN_VOTES, MIN_STAR_SIZE_FRACTION, STAR_PROXIMITY_FACTOR};
use crate::detection::components::connected_components;
use crate::detection::config::DetectionConfig;
use crate::detection::fit::fit_fwhm;
use crate::frame::Star;
use crate::image::{sample, Interpolation};

/// Per-pixel local mean over a `(2R+1)x(2R+1)` box, sub-sampled at `stride`,
/// subtracted from the source: `out = src - local_mean`.
fn local_mean_subtract(src: &Array2<f32>, radius: i64, stride: i64) -> Array2<f32> {
    let (h, w) = src.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    for r in 0..h {
        for c in 0..w {
            let mut sum = 0.0f32;
            let mut count = 0.0f32;
            let mut dr = -radius;
            while dr <= radius {
                let rr = r as i64 + dr;
                if rr >= 0 && (rr as usize) < h {
                    let mut dc = -radius;
                    while dc <= radius {
                        let cc = c as i64 + dc;
                        if cc >= 0 && (cc as usize) < w {
                            sum += src[[rr as usize, cc as usize]];
                            count += 1.0;
                        }
                        dc += stride;
                    }
                }
                dr += stride;
            }
            let mean = if count > 0.0 { sum / count } else { 0.0 };
            out[[r, c]] = src[[r, c]] - mean;
        }
    }
    out
}

/// Binarise `subtracted` via a 5x5 majority filter: a pixel survives if at
/// least [`MAJORITY_FILTER_MIN_VOTES`] of its 25 neighbours (including
/// itself, clipped at borders) exceed `min_peak`.
fn majority_filter(subtracted: &Array2<f32>, min_peak: f32) -> Array2<bool> {
    let (h, w) = subtracted.dim();
    let mut mask = Array2::<bool>::from_elem((h, w), false);
    for r in 0..h {
        for c in 0..w {
            let mut votes = 0usize;
            for dr in -2i64..=2 {
                for dc in -2i64..=2 {
                    let rr = r as i64 + dr;
                    let cc = c as i64 + dc;
                    if rr >= 0 && cc >= 0 && (rr as usize) < h && (cc as usize) < w {
                        if subtracted[[rr as usize, cc as usize]] > min_peak {
                            votes += 1;
                        }
                    }
                }
            }
            mask[[r, c]] = votes >= MAJORITY_FILTER_MIN_VOTES;
        }
    }
    mask
}

/// Distance in pixels from `border` the point `(x, y)` must be at least, to
/// survive; returns `true` if `(x, y)` is too close to (or outside) the
/// image border.
fn too_close_to_border(x: f32, y: f32, w: usize, h: usize, margin: f32) -> bool {
    x < margin || y < margin || x > w as f32 - margin || y > h as f32 - margin
}

/// Extract a background-subtracted 1-D strip of length `2R+1` through
/// `(cx, cy)` along the requested axis (`horizontal` picks varying x,
/// `!horizontal` picks varying y), bilinearly sampled.
fn extract_strip(
    data: &Array2<f32>,
    background: &Array2<f32>,
    cx: f32,
    cy: f32,
    radius: i64,
    horizontal: bool,
) -> Vec<f32> {
    (-radius..=radius)
        .map(|k| {
            let (x, y) = if horizontal {
                (cx + k as f32, cy)
            } else {
                (cx, cy + k as f32)
            };
            let v = sample(data, x, y, Interpolation::Bilinear);
            let bg = sample(background, x, y, Interpolation::Bilinear);
            v - bg
        })
        .collect()
}

struct Candidate {
    x: f32,
    y: f32,
    peak: f32,
    mass: f32,
    background: f32,
    size_x: f32,
    size_y: f32,
}

fn measure_component(
    pixels: &[(usize, usize)],
    data: &Array2<f32>,
    background: &Array2<f32>,
    radius: i64,
    w: usize,
    h: usize,
) -> Option<Candidate> {
    let n = pixels.len() as f32;
    let (sum_r, sum_c) = pixels
        .iter()
        .fold((0.0f32, 0.0f32), |(sr, sc), &(r, c)| (sr + r as f32, sc + c as f32));
    let cy0 = sum_r / n + 0.5;
    let cx0 = sum_c / n + 0.5;

    // The measurement window, the FWHM strip half-width, and the border
    // margin all share this same radius (twice the detection box radius),
    // not the bare detection radius — matching the original's single
    // `range` quantity used for all three.
    let measure_radius = 2 * radius;
    let margin = measure_radius as f32;
    if too_close_to_border(cx0, cy0, w, h, margin) {
        return None;
    }

    let bg0 = sample(background, cx0, cy0, Interpolation::Bilinear);

    let mut peak = f32::MIN;
    let mut mass = 0.0f32;
    let mut wx = 0.0f32;
    let mut wy = 0.0f32;

    let ir = measure_radius;
    let icx = cx0.round() as i64;
    let icy = cy0.round() as i64;
    for dr in -ir..=ir {
        for dc in -ir..=ir {
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
        return None;
    }

    let cx = wx / mass;
    let cy = wy / mass;
    if too_close_to_border(cx, cy, w, h, margin) {
        return None;
    }

    let background_refined = sample(background, cx, cy, Interpolation::Bilinear);

    let strip_x = extract_strip(data, background, cx, cy, measure_radius, true);
    let strip_y = extract_strip(data, background, cx, cy, measure_radius, false);
    let size_x = fit_fwhm(&strip_x, measure_radius as usize);
    let size_y = fit_fwhm(&strip_y, measure_radius as usize);

    Some(Candidate {
        x: cx,
        y: cy,
        peak,
        mass,
        background: background_refined,
        size_x,
        size_y,
    })
}

/// Detect stars on the (cosmetically corrected) template frame.
///
/// Returns freshly id-numbered stars in component-discovery order; rejected
/// candidates are dropped entirely, not kept as invalidated placeholders.
pub fn detect_template(
    data: &Array2<f32>,
    background: &Array2<f32>,
    config: &DetectionConfig,
) -> Vec<Star> {
    let (h, w) = data.dim();
    let radius = config.box_radius();
    let stride = (((2 * radius + 1) / 7).max(1)) as i64;

    let subtracted = local_mean_subtract(data, radius, stride);
    let mask = majority_filter(&subtracted, config.min_peak);
    let components = connected_components(&mask);

    let min_size = MIN_STAR_SIZE_FRACTION * config.approx_fwhm;
    let proximity = STAR_PROXIMITY_FACTOR * config.approx_fwhm;
    let proximity_sq = proximity * proximity;

    let mut candidates: Vec<Candidate> = components
        .iter()
        .filter_map(|comp| measure_component(&comp.pixels, data, background, radius, w, h))
        .collect();

    // Reject by peak range and minimum size first.
    candidates.retain(|cand| {
        cand.peak >= config.min_peak
            && cand.peak <= config.saturation_threshold
            && cand.size_x >= min_size
            && cand.size_y >= min_size
    });

    // Reject the later of any pair closer than the proximity threshold,
    // preserving earlier (brighter-component-discovery-order) detections.
    let mut keep = vec![true; candidates.len()];
    for i in 0..candidates.len() {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if !keep[j] {
                continue;
            }
            let dx = candidates[i].x - candidates[j].x;
            let dy = candidates[i].y - candidates[j].y;
            if dx * dx + dy * dy < proximity_sq {
                keep[j] = false;
            }
        }
    }

    candidates
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .enumerate()
        .map(|(id, (cand, _))| Star {
            id,
            x: cand.x,
            y: cand.y,
            background: cand.background,
            peak: cand.peak,
            size_x: cand.size_x,
            size_y: cand.size_y,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn gaussian_field(w: usize, h: usize, stars: &[(f32, f32)], sigma: f32, amp: f32) -> Array2<f32> {
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

    #[test]
    fn detects_well_separated_gaussians() {
        let stars = [
            (20.0, 20.0),
            (60.0, 20.0),
            (100.0, 20.0),
            (20.0, 100.0),
            (100.0, 100.0),
        ];
        let data = gaussian_field(128, 128, &stars, 2.0, 1.0);
        let background = Array2::<f32>::zeros((128, 128));
        let config = DetectionConfig {
            approx_fwhm: 5.0,
            min_peak: 0.2,
            saturation_threshold: 0.9,
        };
        let detected = detect_template(&data, &background, &config);
        assert_eq!(detected.len(), 5);
        for star in &detected {
            let nearest = stars
                .iter()
                .map(|&(sx, sy)| {
                    let dx = star.x - sx;
                    let dy = star.y - sy;
                    (dx * dx + dy * dy).sqrt()
                })
                .fold(f32::INFINITY, f32::min);
            assert!(nearest < 0.3, "star at ({},{}) too far from truth", star.x, star.y);
            let expected_fwhm = 2.35482 * 2.0;
            assert!(
                (star.size_x - expected_fwhm).abs() / expected_fwhm < 0.15,
                "sizeX={} expected~{}",
                star.size_x,
                expected_fwhm
            );
        }
    }
}
