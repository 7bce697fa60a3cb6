//! 8-connected component labelling over a binary mask, via LIFO flood fill.

use ndarray::Array2;

/// One connected component: its member pixel coordinates as `(row, col)`.
#[derive(Clone, Debug)]
pub struct Component {
    pub pixels: Vec<(usize, usize)>,
}

/// Find all 8-connected components of `true` pixels in `mask`, in
/// discovery order (row-major scan order of each component's seed pixel).
pub fn connected_components(mask: &Array2<bool>) -> Vec<Component> {
    let (h, w) = mask.dim();
    let mut visited = Array2::<bool>::from_elem((h, w), false);
    let mut components = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for r in 0..h {
        for c in 0..w {
            if !mask[[r, c]] || visited[[r, c]] {
                continue;
            }

            let mut pixels = Vec::new();
            stack.push((r, c));
            visited[[r, c]] = true;

            while let Some((cr, cc)) = stack.pop() {
                pixels.push((cr, cc));
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = cr as i64 + dr;
                        let nc = cc as i64 + dc;
                        if nr < 0 || nc < 0 || nr as usize >= h || nc as usize >= w {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if mask[[nr, nc]] && !visited[[nr, nc]] {
                            visited[[nr, nc]] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
            }

            components.push(Component { pixels });
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_pixels_join_under_8_connectivity() {
        let mut mask = Array2::<bool>::from_elem((4, 4), false);
        mask[[0, 0]] = true;
        mask[[1, 1]] = true;
        mask[[2, 2]] = true;
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].pixels.len(), 3);
    }

    #[test]
    fn disjoint_blobs_stay_separate() {
        let mut mask = Array2::<bool>::from_elem((6, 6), false);
        mask[[0, 0]] = true;
        mask[[5, 5]] = true;
        let comps = connected_components(&mask);
        assert_eq!(comps.len(), 2);
    }
}
