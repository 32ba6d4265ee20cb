//! Length resizing by linear interpolation.
//!
//! Sample `i` of an `n_out`-long output is read at fractional input position
//! `i · (n_in − 1) / (n_out − 1)`, so the first and last samples are kept and
//! linear trends survive exactly.  Used to stretch or squeeze every carrier
//! cycle to the same duration and to bring the concatenated cycles to the
//! canonical output length.
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Resize every row of `data` ([C, T]) to `n_out` samples.
pub fn resize(data: ArrayView2<'_, f64>, n_out: usize) -> Array2<f64> {
    let n_ch = data.nrows();
    let mut out = Array2::<f64>::zeros((n_ch, n_out));
    for ch in 0..n_ch {
        let row: Vec<f64> = data.row(ch).to_vec();
        let resized = resize_1d(&row, n_out);
        out.row_mut(ch).assign(&ArrayView1::from(&resized));
    }
    out
}

/// Resize a single signal to `n_out` samples.
pub fn resize_1d(x: &[f64], n_out: usize) -> Vec<f64> {
    let n_in = x.len();
    match (n_in, n_out) {
        (_, 0) | (0, _) => return vec![0.0; n_out],
        (1, _) => return vec![x[0]; n_out],
        (_, 1) => return vec![x[0]],
        _ if n_in == n_out => return x.to_vec(),
        _ => {}
    }

    let step = (n_in - 1) as f64 / (n_out - 1) as f64;
    (0..n_out)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = (pos.floor() as usize).min(n_in - 2);
            let frac = pos - lo as f64;
            x[lo] + frac * (x[lo + 1] - x[lo])
        })
        .collect()
}
