//! Seam to the external time-generalization classifier.
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::trial::{Label, TrialSet};

/// Produces a TGM (`[train time, test time]`) from trials and labels.
///
/// `labels[i]` replaces the label of `trials.trials[i]`; the permutation
/// loop calls this once per shuffle from several threads at a time.
pub trait Classifier: Sync {
    fn tgm(&self, trials: &TrialSet, labels: &[Label]) -> anyhow::Result<Array2<f64>>;
}

impl<F> Classifier for F
where
    F: Fn(&TrialSet, &[Label]) -> anyhow::Result<Array2<f64>> + Sync,
{
    fn tgm(&self, trials: &TrialSet, labels: &[Label]) -> anyhow::Result<Array2<f64>> {
        self(trials, labels)
    }
}

/// Uniformly shuffled copy of `labels`.
pub fn shuffled_labels<R: Rng + ?Sized>(labels: &[Label], rng: &mut R) -> Vec<Label> {
    let mut out = labels.to_vec();
    out.shuffle(rng);
    out
}
