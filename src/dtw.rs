//! Dynamic time warping with path recovery.
//!
//! Cost is the absolute difference `|x[i] − y[j]|`.  Steps are `(i−1, j)`,
//! `(i, j−1)` and `(i−1, j−1)`, so the path is monotone and never skips an
//! index of either sequence.  It always runs from `(0, 0)` to
//! `(n−1, m−1)`.
use crate::error::{BrainTimeError, Result};

/// Alignment between two sequences: `x[ix[k]]` is matched to `y[iy[k]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpPath {
    pub ix: Vec<usize>,
    pub iy: Vec<usize>,
    /// Accumulated cost at `(n−1, m−1)`.
    pub cost: f64,
}

impl WarpPath {
    pub fn len(&self) -> usize {
        self.ix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ix.is_empty()
    }
}

/// Step taken into a cell of the cost grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Step {
    Diag,
    Up,
    Left,
}

/// Minimal-cost monotone alignment of `x` onto `y`.
///
/// Accumulated cost is kept for two rows only; the backtrack reads one byte
/// per cell.
pub fn dtw(x: &[f64], y: &[f64]) -> Result<WarpPath> {
    let (n, m) = (x.len(), y.len());
    if n == 0 || m == 0 {
        return Err(BrainTimeError::shape("DTW input lengths", "both > 0", (n, m)));
    }

    let mut steps = vec![Step::Diag; n * m];
    let mut prev = vec![0.0_f64; m];
    let mut cur = vec![0.0_f64; m];
    for i in 0..n {
        for j in 0..m {
            let cost = (x[i] - y[j]).abs();
            // Ties prefer the diagonal, then the step in x.
            let (best, step) = match (i, j) {
                (0, 0) => (0.0, Step::Diag),
                (0, _) => (cur[j - 1], Step::Left),
                (_, 0) => (prev[0], Step::Up),
                _ => {
                    let (diag, up, left) = (prev[j - 1], prev[j], cur[j - 1]);
                    if diag <= up && diag <= left {
                        (diag, Step::Diag)
                    } else if up <= left {
                        (up, Step::Up)
                    } else {
                        (left, Step::Left)
                    }
                }
            };
            cur[j] = cost + best;
            steps[i * m + j] = step;
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let total = prev[m - 1];

    let mut ix = Vec::with_capacity(n + m);
    let mut iy = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n - 1, m - 1);
    loop {
        ix.push(i);
        iy.push(j);
        if (i, j) == (0, 0) {
            break;
        }
        match steps[i * m + j] {
            Step::Diag => {
                i -= 1;
                j -= 1;
            }
            Step::Up => i -= 1,
            Step::Left => j -= 1,
        }
    }
    ix.reverse();
    iy.reverse();

    Ok(WarpPath { ix, iy, cost: total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_monotone(p: &WarpPath) {
        for k in 1..p.len() {
            let di = p.ix[k] - p.ix[k - 1];
            let dj = p.iy[k] - p.iy[k - 1];
            assert!(di <= 1 && dj <= 1 && di + dj >= 1, "bad step at {k}: ({di}, {dj})");
        }
    }

    #[test]
    fn identical_sequences_align_on_diagonal() {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let p = dtw(&x, &x).unwrap();
        assert_eq!(p.ix, (0..50).collect::<Vec<_>>());
        assert_eq!(p.ix, p.iy);
        assert_eq!(p.cost, 0.0);
    }

    #[test]
    fn path_spans_both_sequences() {
        let x: Vec<f64> = (0..40).map(|i| (i as f64 * 0.21).sin()).collect();
        let y: Vec<f64> = (0..25).map(|i| (i as f64 * 0.33).sin()).collect();
        let p = dtw(&x, &y).unwrap();
        assert_eq!((p.ix[0], p.iy[0]), (0, 0));
        assert_eq!((*p.ix.last().unwrap(), *p.iy.last().unwrap()), (39, 24));
        assert_monotone(&p);
    }

    #[test]
    fn repeated_sample_absorbed() {
        let x = [0.0, 1.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        let p = dtw(&x, &y).unwrap();
        assert_eq!(p.cost, 0.0);
        assert_eq!(p.ix, vec![0, 1, 2, 3]);
        assert_eq!(p.iy, vec![0, 1, 1, 2]);
    }

    #[test]
    fn cost_matches_full_matrix_recursion() {
        let x: Vec<f64> = (0..23).map(|i| (i as f64 * 0.37).sin() * 2.0).collect();
        let y: Vec<f64> = (0..17).map(|i| (i as f64 * 0.51).cos()).collect();
        let (n, m) = (x.len(), y.len());
        let mut acc = vec![vec![f64::INFINITY; m + 1]; n + 1];
        acc[0][0] = 0.0;
        for i in 1..=n {
            for j in 1..=m {
                let best = acc[i - 1][j - 1].min(acc[i - 1][j]).min(acc[i][j - 1]);
                acc[i][j] = (x[i - 1] - y[j - 1]).abs() + best;
            }
        }
        let p = dtw(&x, &y).unwrap();
        approx::assert_abs_diff_eq!(p.cost, acc[n][m], epsilon = 1e-9);
        let along: f64 = p.ix.iter().zip(&p.iy).map(|(&i, &j)| (x[i] - y[j]).abs()).sum();
        approx::assert_abs_diff_eq!(along, p.cost, epsilon = 1e-9);
        assert_monotone(&p);
    }

    #[test]
    fn empty_input_rejected() {
        assert!(dtw(&[], &[1.0]).is_err());
    }
}
