//! Permutation statistics on TGM recurrence spectra.
//!
//! # Level 1 (one participant)
//! ```text
//! for p in 0..num_perms1 (parallel, RNG stream p):
//!     shuffle labels → classifier → permuted TGM
//! normalize?  μ, σ over all permuted TGMs; z-score empirical + permuted
//! spectrum of every TGM:  AC map → row/column-averaged power in stats_range
//! ```
//!
//! # Level 2 (group)
//! ```text
//! empirical = mean over participants of their empirical spectra
//! for q in 0..num_perms2 (parallel, RNG stream q):
//!     null[q] = mean over participants of one uniformly drawn null spectrum
//! p[f]      = #{q : null[q, f] >= empirical[f]} / num_perms2
//! ```
//! Bonferroni correction multiplies each p-value by the number of bins.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::autocorr::autocorr2d;
use crate::classify::{shuffled_labels, Classifier};
use crate::config::{GroupStatsConfig, RefDimension, StatsConfig};
use crate::error::{BrainTimeError, Result};
use crate::normalize::{global_stats, zscore_with_inplace};
use crate::parallel::{self, task_rng};
use crate::quantify::mean_axis_spectrum;
use crate::report::{NullReporter, Reporter};
use crate::spectral::Spectrum;
use crate::trial::TrialSet;

/// Fewest null spectra from which a 95 % interval is reported.
pub const MIN_CI_PERMS: usize = 20;

/// Per-bin 2.5 / 97.5 percentiles of a null distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

// ── Level 1 ───────────────────────────────────────────────────────────────

/// Empirical and label-permuted recurrence spectra of one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationResult {
    /// Spectrum of the empirical TGM.
    pub empirical: Array1<f64>,
    /// One spectrum per permutation: `[num_perms1, bins]`.
    pub null: Array2<f64>,
    /// Shared frequency axis in the spectral unit of `ref_dimension`.
    pub freqs: Vec<f64>,
    pub ref_dimension: RefDimension,
    /// `(μ, σ)` applied to the TGMs, if normalised.
    pub normalization: Option<(f64, f64)>,
}

impl PermutationResult {
    pub fn num_perms(&self) -> usize {
        self.null.nrows()
    }

    /// `None` below [`MIN_CI_PERMS`] permutations.
    pub fn confidence_interval(&self) -> Option<ConfidenceInterval> {
        confidence_interval(self.null.view())
    }

    /// Per-bin proportion of null spectra at or above the empirical one.
    ///
    /// Ties count against the empirical spectrum, which keeps the p-value
    /// conservative.
    pub fn p_values(&self) -> Vec<f64> {
        exceedance(self.empirical.view(), self.null.view())
    }
}

/// Build the level-1 null distribution for one participant.
///
/// `empirical_tgm` is the classifier's TGM for `trials` with their true
/// labels; `classifier` is re-run once per permutation on shuffled labels.
pub fn stats_level1(
    empirical_tgm: ArrayView2<'_, f64>,
    classifier: &dyn Classifier,
    trials: &TrialSet,
    cfg: &StatsConfig,
) -> Result<PermutationResult> {
    stats_level1_with_reporter(empirical_tgm, classifier, trials, cfg, &NullReporter)
}

/// [`stats_level1`], handing the result to `reporter` when `cfg.figure` is on.
pub fn stats_level1_with_reporter(
    empirical_tgm: ArrayView2<'_, f64>,
    classifier: &dyn Classifier,
    trials: &TrialSet,
    cfg: &StatsConfig,
    reporter: &dyn Reporter,
) -> Result<PermutationResult> {
    let rc = cfg.resolve()?;
    let shape = empirical_tgm.dim();
    if shape.0 != shape.1 {
        return Err(BrainTimeError::shape("empirical TGM (must be square)", (shape.0, shape.0), shape));
    }
    let labels = trials.labels();

    let mut permuted: Vec<Array2<f64>> = parallel::install(rc.workers, || {
        (0..rc.num_perms)
            .into_par_iter()
            .map(|perm| {
                let mut rng = task_rng(rc.seed, perm);
                let shuffled = shuffled_labels(&labels, &mut rng);
                let tgm = classifier
                    .tgm(trials, &shuffled)
                    .map_err(|e| BrainTimeError::Classifier { perm, message: format!("{e:#}") })?;
                if tgm.dim() != shape {
                    return Err(BrainTimeError::shape("permuted TGM", shape, tgm.dim()));
                }
                Ok(tgm)
            })
            .collect::<Result<Vec<_>>>()
    })??;
    debug!(perms = permuted.len(), "permuted TGMs ready");

    let mut empirical = empirical_tgm.to_owned();
    let normalization = if rc.normalize {
        let (mean, std) = global_stats(&permuted);
        zscore_with_inplace(&mut empirical, mean, std);
        permuted.iter_mut().for_each(|t| zscore_with_inplace(t, mean, std));
        Some((mean, std))
    } else {
        None
    };

    let spectrum = |tgm: &Array2<f64>| -> Result<Spectrum> {
        mean_axis_spectrum(autocorr2d(tgm.view()).view(), rc.rate, rc.range)
    };
    let emp = spectrum(&empirical)?;
    let null_rows: Vec<Spectrum> = parallel::install(rc.workers, || {
        permuted.par_iter().map(spectrum).collect::<Result<Vec<_>>>()
    })??;

    let bins = emp.len();
    let mut null = Array2::zeros((null_rows.len(), bins));
    for (mut row, s) in null.axis_iter_mut(Axis(0)).zip(&null_rows) {
        row.assign(&ArrayView1::from(&s.power));
    }

    let result = PermutationResult {
        empirical: Array1::from(emp.power),
        null,
        freqs: emp.freqs,
        ref_dimension: rc.ref_dimension,
        normalization,
    };
    info!(
        perms = result.num_perms(),
        bins,
        normalized = rc.normalize,
        dimension = rc.ref_dimension.name(),
        "level-1 permutation statistics done"
    );
    if rc.figure {
        reporter.permutation(&result);
    }
    Ok(result)
}

// ── Level 2 ───────────────────────────────────────────────────────────────

/// Group-level spectra and frequency-wise significance.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    /// Mean of the participants' empirical spectra.
    pub empirical: Array1<f64>,
    /// `[num_perms2, bins]`.
    pub null: Array2<f64>,
    pub freqs: Vec<f64>,
    pub ref_dimension: RefDimension,
    pub p_values: Vec<f64>,
    /// Bonferroni-corrected over bins, capped at 1.
    pub p_values_corrected: Vec<f64>,
    pub n_participants: usize,
}

impl GroupResult {
    /// `None` below [`MIN_CI_PERMS`] group permutations.
    pub fn confidence_interval(&self) -> Option<ConfidenceInterval> {
        confidence_interval(self.null.view())
    }

    /// Frequencies whose corrected p-value is below `alpha`.
    pub fn significant_freqs(&self, alpha: f64) -> Vec<f64> {
        self.freqs
            .iter()
            .zip(&self.p_values_corrected)
            .filter(|&(_, &p)| p < alpha)
            .map(|(&f, _)| f)
            .collect()
    }
}

/// Combine level-1 results of several participants.
pub fn stats_level2(
    participants: &[PermutationResult],
    cfg: &GroupStatsConfig,
) -> Result<GroupResult> {
    stats_level2_with_reporter(participants, cfg, &NullReporter)
}

/// [`stats_level2`], handing the result to `reporter` when `cfg.figure` is on.
pub fn stats_level2_with_reporter(
    participants: &[PermutationResult],
    cfg: &GroupStatsConfig,
    reporter: &dyn Reporter,
) -> Result<GroupResult> {
    cfg.validate()?;
    let Some(first) = participants.first() else {
        return Err(BrainTimeError::config("participants", "need at least one level-1 result"));
    };
    let bins = first.freqs.len();
    for (i, p) in participants.iter().enumerate() {
        if p.freqs.len() != bins || p.empirical.len() != bins || p.null.ncols() != bins {
            return Err(BrainTimeError::ShapeMismatch {
                what: "participant spectra (same stats_range and TGM size required)",
                expected: bins.to_string(),
                got: format!("{} (participant {i})", p.empirical.len()),
            });
        }
        if p.ref_dimension.name() != first.ref_dimension.name() {
            return Err(BrainTimeError::config(
                "ref_dimension",
                format!("participant {i} uses {}, participant 0 uses {}", p.ref_dimension.name(), first.ref_dimension.name()),
            ));
        }
        if p.num_perms() == 0 {
            return Err(BrainTimeError::config("num_perms1", format!("participant {i} has no null spectra")));
        }
    }

    let n = participants.len() as f64;
    let mut empirical = Array1::<f64>::zeros(bins);
    for p in participants {
        empirical += &p.empirical;
    }
    empirical /= n;

    let rows: Vec<Array1<f64>> = parallel::install(cfg.workers, || {
        (0..cfg.num_perms2)
            .into_par_iter()
            .map(|q| {
                let mut rng = task_rng(cfg.seed, q);
                let mut acc = Array1::<f64>::zeros(bins);
                for p in participants {
                    let pick = rng.random_range(0..p.num_perms());
                    acc += &p.null.row(pick);
                }
                acc / n
            })
            .collect()
    })?;
    let mut null = Array2::zeros((rows.len(), bins));
    for (mut row, r) in null.axis_iter_mut(Axis(0)).zip(&rows) {
        row.assign(r);
    }

    let p_values = exceedance(empirical.view(), null.view());
    let p_values_corrected = p_values.iter().map(|p| (p * bins as f64).min(1.0)).collect();

    let result = GroupResult {
        empirical,
        null,
        freqs: first.freqs.clone(),
        ref_dimension: first.ref_dimension,
        p_values,
        p_values_corrected,
        n_participants: participants.len(),
    };
    info!(
        participants = result.n_participants,
        perms = cfg.num_perms2,
        bins,
        "level-2 group statistics done"
    );
    if cfg.figure {
        reporter.group(&result);
    }
    Ok(result)
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// 2.5 / 97.5 percentiles of every column of `null` (`[perms, bins]`).
pub fn confidence_interval(null: ArrayView2<'_, f64>) -> Option<ConfidenceInterval> {
    if null.nrows() < MIN_CI_PERMS {
        return None;
    }
    let (lower, upper) = null
        .columns()
        .into_iter()
        .map(|col| {
            let mut sorted = col.to_vec();
            sorted.sort_unstable_by(|a, b| a.total_cmp(b));
            (quantile_sorted(&sorted, 0.025), quantile_sorted(&sorted, 0.975))
        })
        .unzip();
    Some(ConfidenceInterval { lower, upper })
}

/// R-7 quantile (linear interpolation) of ascending, non-empty `sorted`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    if lo >= n - 1 {
        return sorted[n - 1];
    }
    sorted[lo] + (h - lo as f64) * (sorted[lo + 1] - sorted[lo])
}

/// Per-column share of `null` rows at or above `empirical`.
///
/// A null value equal to the empirical one counts as exceeding it.
fn exceedance(empirical: ArrayView1<'_, f64>, null: ArrayView2<'_, f64>) -> Vec<f64> {
    let perms = null.nrows().max(1) as f64;
    empirical
        .iter()
        .zip(null.columns())
        .map(|(&e, col)| col.iter().filter(|&&v| v >= e).count() as f64 / perms)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn result_with_null(null: Array2<f64>, empirical: Array1<f64>) -> PermutationResult {
        let bins = empirical.len();
        PermutationResult {
            empirical,
            null,
            freqs: (1..=bins).map(|f| f as f64).collect(),
            ref_dimension: RefDimension::ClockTime,
            normalization: None,
        }
    }

    #[test]
    fn r7_quantile() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&x, 0.5), 3.0);
        assert_eq!(quantile_sorted(&x, 0.0), 1.0);
        assert_eq!(quantile_sorted(&x, 1.0), 5.0);
        approx::assert_abs_diff_eq!(quantile_sorted(&x, 0.1), 1.4, epsilon = 1e-12);
    }

    #[test]
    fn interval_needs_twenty_rows() {
        let n19 = Array2::from_shape_fn((19, 3), |(i, _)| i as f64);
        let n20 = Array2::from_shape_fn((20, 3), |(i, _)| i as f64);
        assert!(confidence_interval(n19.view()).is_none());
        let ci = confidence_interval(n20.view()).unwrap();
        approx::assert_abs_diff_eq!(ci.lower[0], 0.475, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(ci.upper[2], 18.525, epsilon = 1e-12);
    }

    #[test]
    fn p_values_count_ties() {
        let r = result_with_null(array![[1.0, 5.0], [2.0, 5.0], [3.0, 0.0], [4.0, 0.0]], array![3.0, 5.0]);
        assert_eq!(r.p_values(), vec![0.5, 0.5]);
    }

    #[test]
    fn group_mean_and_bonferroni() {
        let a = result_with_null(Array2::zeros((4, 3)), array![1.0, 0.0, -1.0]);
        let b = result_with_null(Array2::zeros((6, 3)), array![3.0, 0.0, -3.0]);
        let cfg = GroupStatsConfig { num_perms2: 50, ..Default::default() };
        let g = stats_level2(&[a, b], &cfg).unwrap();
        assert_eq!(g.empirical, array![2.0, 0.0, -2.0]);
        assert_eq!(g.null.dim(), (50, 3));
        assert_eq!(g.p_values, vec![0.0, 1.0, 1.0]);
        assert_eq!(g.p_values_corrected, vec![0.0, 1.0, 1.0]);
        assert!(g.confidence_interval().is_some());
        assert_eq!(g.significant_freqs(0.05), vec![1.0]);
    }

    #[test]
    fn group_null_is_reproducible() {
        let null = Array2::from_shape_fn((30, 2), |(i, j)| (i * 2 + j) as f64);
        let a = result_with_null(null.clone(), array![0.0, 0.0]);
        let b = result_with_null(null, array![0.0, 0.0]);
        let cfg = GroupStatsConfig { num_perms2: 40, seed: 11, workers: Some(2), ..Default::default() };
        let g1 = stats_level2(&[a.clone(), b.clone()], &cfg).unwrap();
        let g2 = stats_level2(&[a, b], &GroupStatsConfig { workers: Some(1), ..cfg }).unwrap();
        assert_eq!(g1.null, g2.null);
    }

    #[test]
    fn mismatched_participants_rejected() {
        let a = result_with_null(Array2::zeros((2, 3)), Array1::zeros(3));
        let b = result_with_null(Array2::zeros((2, 4)), Array1::zeros(4));
        assert!(matches!(
            stats_level2(&[a, b], &GroupStatsConfig::default()),
            Err(BrainTimeError::ShapeMismatch { .. })
        ));
        assert!(stats_level2(&[], &GroupStatsConfig::default()).is_err());
    }
}
