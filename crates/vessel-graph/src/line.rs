//! N-dimensional discretized line drawing between two pixels.

use crate::types::{MAX_DIMS, Pixel};

/// Rasterize the straight line from `start` to `stop`.
///
/// The line is sampled at `max_axis_distance` evenly spaced positions
/// starting at `start` (one more when `endpoint` is `true`, so that
/// `stop` is included), and every position is rounded to the nearest
/// pixel with ties going to the even coordinate. Consecutive pixels are
/// always grid-adjacent.
///
/// Returns an empty vector if the two pixels differ in dimensionality.
#[must_use]
pub fn line_nd(start: Pixel, stop: Pixel, endpoint: bool) -> Vec<Pixel> {
    if start.ndim() != stop.ndim() {
        return Vec::new();
    }
    let ndim = start.ndim();
    let steps = start
        .coords()
        .iter()
        .zip(stop.coords())
        .map(|(a, b)| (b - a).unsigned_abs())
        .max()
        .unwrap_or(0);
    let samples = if endpoint { steps + 1 } else { steps };
    if samples == 0 {
        return Vec::new();
    }
    // With `endpoint`, the last sample lands exactly on `stop`.
    #[allow(clippy::cast_precision_loss)]
    let divisor = (if endpoint { steps.max(1) } else { steps }) as f64;

    (0..samples)
        .map(|k| {
            let mut coords = [0_i64; MAX_DIMS];
            for (axis, c) in coords.iter_mut().enumerate().take(ndim) {
                let a = start.coords()[axis];
                let b = stop.coords()[axis];
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                {
                    let t = k as f64 / divisor;
                    *c = ((b - a) as f64).mul_add(t, a as f64).round_ties_even() as i64;
                }
            }
            if ndim == 3 {
                Pixel::new_3d(coords[0], coords[1], coords[2])
            } else {
                Pixel::new_2d(coords[0], coords[1])
            }
        })
        .collect()
}

/// Pixels strictly between `start` and `stop` on the discretized line.
///
/// Neither endpoint is included, so `[start] ++ line_between(start, stop) ++ [stop]`
/// is a contiguous chain. Adjacent or identical pixels yield an empty
/// vector.
#[must_use]
pub fn line_between(start: Pixel, stop: Pixel) -> Vec<Pixel> {
    let mut line = line_nd(start, stop, false);
    if !line.is_empty() {
        line.remove(0);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_line_excludes_stop() {
        let line = line_nd(Pixel::new_2d(0, 0), Pixel::new_2d(0, 3), false);
        assert_eq!(
            line,
            vec![Pixel::new_2d(0, 0), Pixel::new_2d(0, 1), Pixel::new_2d(0, 2)]
        );
    }

    #[test]
    fn endpoint_includes_stop() {
        let line = line_nd(Pixel::new_2d(0, 0), Pixel::new_2d(2, 2), true);
        assert_eq!(
            line,
            vec![Pixel::new_2d(0, 0), Pixel::new_2d(1, 1), Pixel::new_2d(2, 2)]
        );
    }

    #[test]
    fn same_pixel_is_empty_without_endpoint() {
        let p = Pixel::new_2d(4, 4);
        assert!(line_nd(p, p, false).is_empty());
        assert_eq!(line_nd(p, p, true), vec![p]);
    }

    #[test]
    fn line_between_excludes_both_ends() {
        let line = line_between(Pixel::new_2d(2, 2), Pixel::new_2d(2, 5));
        assert_eq!(line, vec![Pixel::new_2d(2, 3), Pixel::new_2d(2, 4)]);
        assert!(line_between(Pixel::new_2d(0, 0), Pixel::new_2d(1, 1)).is_empty());
    }

    #[test]
    fn shallow_line_rounds_half_to_even() {
        // Samples at col 0..4 have rows 0, 0.5, 1, 1.5 -> 0, 0, 1, 2.
        let line = line_nd(Pixel::new_2d(0, 0), Pixel::new_2d(2, 4), false);
        assert_eq!(
            line,
            vec![
                Pixel::new_2d(0, 0),
                Pixel::new_2d(0, 1),
                Pixel::new_2d(1, 2),
                Pixel::new_2d(2, 3),
            ]
        );
    }

    #[test]
    fn lines_are_contiguous_3d() {
        let start = Pixel::new_3d(0, 0, 0);
        let stop = Pixel::new_3d(3, -5, 7);
        let mut chain = vec![start];
        chain.extend(line_between(start, stop));
        chain.push(stop);
        for pair in chain.windows(2) {
            assert!(pair[0].is_adjacent(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn mixed_dimensions_yield_nothing() {
        assert!(line_nd(Pixel::new_2d(0, 0), Pixel::new_3d(0, 0, 3), true).is_empty());
    }
}
