mod common;
use common::{cos_grid, make_trials};

use braintime::io::{save_group, save_permutation, StReader};
use braintime::normalize::{global_stats, zscore_with_inplace};
use braintime::stats::MIN_CI_PERMS;
use braintime::{
    stats_level1, stats_level2, BrainTimeError, Classifier, GroupStatsConfig, Label,
    PermutationResult, RefDimension, StatsConfig, TrialSet,
};
use ndarray::Array2;

/// Recurrence strength grows with the share of trials keeping their true label.
struct AgreementClassifier {
    truth: Vec<Label>,
    n: usize,
}

impl Classifier for AgreementClassifier {
    fn tgm(&self, _trials: &TrialSet, labels: &[Label]) -> anyhow::Result<Array2<f64>> {
        let agree = labels.iter().zip(&self.truth).filter(|(a, b)| a == b).count() as f64
            / labels.len() as f64;
        let salt = labels.iter().enumerate().map(|(k, &l)| k * l as usize).sum::<usize>();
        let grid = cos_grid(self.n, 8.0, 8.0, 32.0);
        Ok(Array2::from_shape_fn((self.n, self.n), |(i, j)| {
            agree * grid[[i, j]] + 0.1 * ((i * 7 + j * 3 + salt) % 5) as f64
        }))
    }
}

/// The same TGMs on a large gain and offset.
struct Rescaled(AgreementClassifier);

impl Classifier for Rescaled {
    fn tgm(&self, trials: &TrialSet, labels: &[Label]) -> anyhow::Result<Array2<f64>> {
        Ok(self.0.tgm(trials, labels)?.mapv(|v| 0.5 + 10.0 * v))
    }
}

/// Largest absolute difference relative to the largest magnitude in either.
fn max_rel_diff<'a>(a: impl IntoIterator<Item = &'a f64>, b: impl IntoIterator<Item = &'a f64>) -> f64 {
    let (diff, scale) = a.into_iter().zip(b).fold((0.0_f64, 0.0_f64), |(d, s), (x, y)| {
        (d.max((x - y).abs()), s.max(x.abs()).max(y.abs()))
    });
    diff / scale.max(f64::MIN_POSITIVE)
}

fn setup() -> (TrialSet, AgreementClassifier, Array2<f64>) {
    let trials = make_trials(20, 2, 64, 32.0);
    let clf = AgreementClassifier { truth: trials.labels(), n: 32 };
    let empirical = clf.tgm(&trials, &trials.labels()).unwrap();
    (trials, clf, empirical)
}

fn cfg(perms: usize) -> StatsConfig {
    StatsConfig {
        sample_rate: 32.0,
        stats_range: (1, 15),
        num_perms1: perms,
        seed: 3,
        ..StatsConfig::default()
    }
}

#[test]
fn five_permutations_without_normalisation() {
    let (trials, clf, emp) = setup();
    let c = StatsConfig { normalize: false, ..cfg(5) };
    let r = stats_level1(emp.view(), &clf, &trials, &c).unwrap();

    // n = 32 at 32 samples/s → 1 Hz bins; [1, 15] holds 15 of them.
    assert_eq!(r.null.dim(), (5, 15));
    assert_eq!(r.empirical.len(), 15);
    assert_eq!(r.freqs.len(), 15);
    assert!(r.freqs.iter().all(|&f| (1.0..=15.0).contains(&f)));
    assert_eq!(r.normalization, None);
    assert!(r.confidence_interval().is_none());
}

#[test]
fn interval_gated_at_twenty_permutations() {
    let (trials, clf, emp) = setup();
    let r19 = stats_level1(emp.view(), &clf, &trials, &cfg(MIN_CI_PERMS - 1)).unwrap();
    let r20 = stats_level1(emp.view(), &clf, &trials, &cfg(MIN_CI_PERMS)).unwrap();
    assert!(r19.confidence_interval().is_none());
    let ci = r20.confidence_interval().unwrap();
    assert_eq!(ci.lower.len(), r20.freqs.len());
    assert!(ci.lower.iter().zip(&ci.upper).all(|(l, u)| l <= u));
}

#[test]
fn empirical_recurrence_stands_out() {
    let (trials, clf, emp) = setup();
    let r = stats_level1(emp.view(), &clf, &trials, &cfg(30)).unwrap();
    let k8 = r.freqs.iter().position(|&f| f == 8.0).unwrap();
    assert!(r.p_values()[k8] < 0.1, "p = {}", r.p_values()[k8]);
    assert!(r.normalization.is_some());
}

#[test]
fn seeded_permutations_reproduce() {
    let (trials, clf, emp) = setup();
    let a = stats_level1(emp.view(), &clf, &trials, &StatsConfig { workers: Some(1), ..cfg(8) }).unwrap();
    let b = stats_level1(emp.view(), &clf, &trials, &StatsConfig { workers: Some(3), ..cfg(8) }).unwrap();
    assert_eq!(a, b);
    let c = stats_level1(emp.view(), &clf, &trials, &StatsConfig { seed: 4, ..cfg(8) }).unwrap();
    assert_ne!(a.null, c.null);
}

#[test]
fn renormalising_null_tensor_is_idempotent() {
    let (trials, clf, _) = setup();
    let mut tgms: Vec<Array2<f64>> = (0..6)
        .map(|s| {
            let mut labels = trials.labels();
            labels.rotate_left(s);
            clf.tgm(&trials, &labels).unwrap()
        })
        .collect();
    let (m, s) = global_stats(&tgms);
    tgms.iter_mut().for_each(|t| zscore_with_inplace(t, m, s));
    let once = tgms.clone();
    let (m2, s2) = global_stats(&tgms);
    approx::assert_abs_diff_eq!(m2, 0.0, epsilon = 1e-12);
    approx::assert_abs_diff_eq!(s2, 1.0, epsilon = 1e-12);
    tgms.iter_mut().for_each(|t| zscore_with_inplace(t, m2, s2));
    for (a, b) in tgms.iter().zip(&once) {
        assert!(a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9));
    }
}

#[test]
fn normalisation_changes_spectra_of_rescaled_tgms() {
    let (trials, clf, _) = setup();
    let clf = Rescaled(clf);
    let emp = clf.tgm(&trials, &trials.labels()).unwrap();
    let on = stats_level1(emp.view(), &clf, &trials, &cfg(10)).unwrap();
    let off = stats_level1(emp.view(), &clf, &trials, &StatsConfig { normalize: false, ..cfg(10) }).unwrap();

    let (_, std) = on.normalization.unwrap();
    assert!(std > 1.0, "sigma = {std}");
    assert!(max_rel_diff(&on.empirical, &off.empirical) > 1e-3);
    assert!(max_rel_diff(&on.null, &off.null) > 1e-3);
}

#[test]
fn normalised_spectra_ignore_gain_and_offset() {
    let (trials, clf, emp) = setup();
    let plain = stats_level1(emp.view(), &clf, &trials, &cfg(10)).unwrap();

    let rescaled = Rescaled(clf);
    let emp = rescaled.tgm(&trials, &trials.labels()).unwrap();
    let r = stats_level1(emp.view(), &rescaled, &trials, &cfg(10)).unwrap();

    assert!(max_rel_diff(&plain.empirical, &r.empirical) < 1e-6);
    assert!(max_rel_diff(&plain.null, &r.null) < 1e-6);
}

#[test]
fn braintime_range_is_rescaled() {
    let (trials, clf, emp) = setup();
    let c = StatsConfig {
        ref_dimension: RefDimension::BrainTime { carrier_freq: 4.0 },
        stats_range: (1, 15),
        ..cfg(2)
    };
    // 32 samples/s over 4 Hz: 8 samples per cycle, range [0.25, 3.75] per cycle.
    let r = stats_level1(emp.view(), &clf, &trials, &c).unwrap();
    assert_eq!(r.freqs.first(), Some(&0.25));
    assert_eq!(r.freqs.last(), Some(&3.75));
    assert_eq!(r.ref_dimension, c.ref_dimension);
}

#[test]
fn classifier_errors_name_the_permutation() {
    let (trials, _, emp) = setup();
    let failing = |_: &TrialSet, _: &[Label]| -> anyhow::Result<Array2<f64>> { anyhow::bail!("solver diverged") };
    match stats_level1(emp.view(), &failing, &trials, &cfg(3)) {
        Err(BrainTimeError::Classifier { perm, message }) => {
            assert!(perm < 3);
            assert!(message.contains("diverged"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn wrong_tgm_shape_rejected() {
    let (trials, clf, _) = setup();
    let emp = Array2::zeros((16, 16));
    assert!(matches!(
        stats_level1(emp.view(), &clf, &trials, &cfg(2)),
        Err(BrainTimeError::ShapeMismatch { .. })
    ));
}

fn participant(seed: u64) -> PermutationResult {
    let (trials, clf, emp) = setup();
    stats_level1(emp.view(), &clf, &trials, &StatsConfig { seed, ..cfg(25) }).unwrap()
}

#[test]
fn group_level_inference() {
    let parts: Vec<PermutationResult> = (0..3).map(participant).collect();
    let g = stats_level2(&parts, &GroupStatsConfig { num_perms2: 200, seed: 1, ..Default::default() }).unwrap();

    assert_eq!(g.n_participants, 3);
    assert_eq!(g.null.dim(), (200, 15));
    assert_eq!(g.freqs, parts[0].freqs);
    let k8 = g.freqs.iter().position(|&f| f == 8.0).unwrap();
    assert!(g.p_values[k8] < 0.05);
    for (p, pc) in g.p_values.iter().zip(&g.p_values_corrected) {
        assert!(*pc >= *p && *pc <= 1.0);
    }
    assert!(g.confidence_interval().is_some());

    let few = stats_level2(&parts, &GroupStatsConfig { num_perms2: 19, ..Default::default() }).unwrap();
    assert!(few.confidence_interval().is_none());
}

#[test]
fn permutation_bundles_written() {
    let r = participant(0);
    let dir = std::env::temp_dir();
    let p1 = dir.join(format!("braintime_perm_{}.safetensors", std::process::id()));
    save_permutation(&r, &p1).unwrap();
    let rd = StReader::open(&p1).unwrap();
    assert_eq!(rd.array2("empspec").unwrap().dim(), (1, 15));
    assert_eq!(rd.array2("shuffspec").unwrap(), r.null);
    assert_eq!(rd.vec("f").unwrap(), r.freqs);
    assert!(rd.contains("ci_lower"));
    std::fs::remove_file(p1).ok();

    let g = stats_level2(&[r.clone(), r], &GroupStatsConfig { num_perms2: 10, ..Default::default() }).unwrap();
    let p2 = dir.join(format!("braintime_group_{}.safetensors", std::process::id()));
    save_group(&g, &p2).unwrap();
    let rd = StReader::open(&p2).unwrap();
    assert_eq!(rd.vec("p_corrected").unwrap(), g.p_values_corrected);
    assert!(!rd.contains("ci_lower"));
    std::fs::remove_file(p2).ok();
}
