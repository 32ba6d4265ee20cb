//! Global z-score normalisation.
//!
//! `global_stats`           — μ, σ (ddof = 0) over every element of every matrix
//! `zscore_with_inplace`    — data = (data − μ) / σ  with supplied μ, σ
//! `zscore_global_inplace`  — both of the above on one matrix
//!
//! The permutation statistics pool μ, σ over all permuted TGMs and apply them
//! to the empirical TGM as well; the display path z-scores AC maps on their own.
use ndarray::Array2;

/// Mean and population standard deviation over all elements of `mats`.
///
/// Returns `(0, 0)` when there are no elements.
pub fn global_stats<'a, I>(mats: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a Array2<f64>> + Clone,
{
    let (sum, n) = mats
        .clone()
        .into_iter()
        .fold((0.0, 0usize), |(s, n), m| (s + m.sum(), n + m.len()));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let ss: f64 = mats
        .into_iter()
        .map(|m| m.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>())
        .sum();
    (mean, (ss / n as f64).sqrt())
}

/// `(data − mean) / std`; with `std == 0` only the mean is removed.
pub fn zscore_with_inplace(data: &mut Array2<f64>, mean: f64, std: f64) {
    if std > 0.0 {
        data.mapv_inplace(|v| (v - mean) / std);
    } else {
        data.mapv_inplace(|v| v - mean);
    }
}

/// Global z-score over all elements.
/// Returns (mean, std) used for normalisation.
pub fn zscore_global_inplace(data: &mut Array2<f64>) -> (f64, f64) {
    let (mean, std) = global_stats(std::iter::once(&*data));
    zscore_with_inplace(data, mean, std);
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zscore_mean_zero_std_one() {
        let mut data = Array2::from_shape_fn((8, 512), |(c, t)| {
            (c as f64 * 3.7 + t as f64 * 0.1).sin() * 50.0
        });
        let (_, std) = zscore_global_inplace(&mut data);
        let (out_mean, out_std) = global_stats([&data]);
        approx::assert_abs_diff_eq!(out_mean, 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out_std, 1.0, epsilon = 1e-12);
        assert!(std > 0.0);
    }

    #[test]
    fn constant_matrix_is_only_centred() {
        let mut data = Array2::from_elem((4, 16), 7.0);
        let (m, s) = zscore_global_inplace(&mut data);
        assert_eq!((m, s), (7.0, 0.0));
        assert!(data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn renormalising_is_a_no_op() {
        let mut data = Array2::from_shape_fn((6, 40), |(i, j)| (i * j) as f64 * 0.3 - 2.0);
        zscore_global_inplace(&mut data);
        let once = data.clone();
        zscore_global_inplace(&mut data);
        for (a, b) in data.iter().zip(once.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn stats_pool_several_matrices() {
        let a = Array2::from_elem((2, 2), 1.0);
        let b = Array2::from_elem((2, 2), 3.0);
        let (m, s) = global_stats([&a, &b]);
        assert_eq!((m, s), (2.0, 1.0));
    }
}
