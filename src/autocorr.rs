//! 2-D autocorrelation of a matrix.
//!
//! The matrix is zero-padded to `(2n−1) × (2m−1)`, so the FFT product `|F|²`
//! gives the linear (not circular) autocorrelation: the plain sum of
//! lag products over the overlap,
//!
//! ```text
//! r(di, dj) = Σ a[i, j] · a[i + di, j + dj]
//! out[i, j] = r(i − n/2, j − m/2)
//! ```
//!
//! so the zero lag sits at `(n/2, m/2)` and `out` has the input's shape.
//! No centring or scaling is applied; the map keeps the amplitude of its
//! input, and [`crate::Quantification::display_map`] z-scores it for display.
use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, FftPlanner};

/// Autocorrelation surface of `a` ([n, m]) with the same shape.
pub fn autocorr2d(a: ArrayView2<'_, f64>) -> Array2<f64> {
    let (n, m) = a.dim();
    if n == 0 || m == 0 {
        return Array2::zeros((n, m));
    }
    let (p, q) = (2 * n - 1, 2 * m - 1);

    let mut buf = vec![Complex::<f64>::default(); p * q];
    for ((i, j), &v) in a.indexed_iter() {
        buf[i * q + j] = Complex { re: v, im: 0.0 };
    }

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    fft2_inplace(&mut planner, &mut buf, p, q, false);
    buf.iter_mut().for_each(|v| *v = Complex { re: v.norm_sqr(), im: 0.0 });
    fft2_inplace(&mut planner, &mut buf, p, q, true);

    // rustfft leaves the inverse unscaled.
    let scale = (p * q) as f64;
    let (ci, cj) = (n / 2, m / 2);
    Array2::from_shape_fn((n, m), |(i, j)| {
        let li = (i as isize - ci as isize).rem_euclid(p as isize) as usize;
        let lj = (j as isize - cj as isize).rem_euclid(q as isize) as usize;
        buf[li * q + lj].re / scale
    })
}

/// In-place 2-D FFT of a row-major `[p, q]` buffer.  The inverse is unscaled.
fn fft2_inplace(
    planner: &mut FftPlanner<f64>,
    buf: &mut [Complex<f64>],
    p: usize,
    q: usize,
    inverse: bool,
) {
    let plan = |planner: &mut FftPlanner<f64>, len| {
        if inverse { planner.plan_fft_inverse(len) } else { planner.plan_fft_forward(len) }
    };

    // rustfft transforms consecutive chunks of the plan length.
    plan(planner, q).process(buf);

    let mut cols = transpose(buf, p, q);
    plan(planner, p).process(&mut cols);
    buf.copy_from_slice(&transpose(&cols, q, p));
}

fn transpose(buf: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::default(); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = buf[r * cols + c];
        }
    }
    out
}
