//! Reporting hooks for the figures the pipeline can produce.
//!
//! Computation never depends on a reporter.  The pipeline calls one only when
//! the matching option (`visual_check`, `figure`) is on, and only after the
//! result it reports on is complete.
use tracing::info;

use crate::dtw::WarpPath;
use crate::quantify::Quantification;
use crate::stats::{GroupResult, PermutationResult};

/// Receiver of intermediate results worth plotting.
pub trait Reporter: Sync {
    /// Warping path of one trial and the path positions that end each cycle.
    fn warp_path(&self, _trial: usize, _path: &WarpPath, _boundaries: &[usize]) {}

    /// AC map and row/column peaks of one TGM.
    fn recurrence(&self, _quant: &Quantification) {}

    /// Empirical vs. null spectra of one participant.
    fn permutation(&self, _result: &PermutationResult) {}

    /// Group-level spectra and p-values.
    fn group(&self, _result: &GroupResult) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Logs one summary line per report at `INFO`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn warp_path(&self, trial: usize, path: &WarpPath, boundaries: &[usize]) {
        info!(
            trial,
            path_len = path.len(),
            cycles = boundaries.len(),
            cost = path.cost,
            "warping path"
        );
    }

    fn recurrence(&self, quant: &Quantification) {
        let (rows, cols) = quant.ac_map.dim();
        info!(
            rows,
            cols,
            dominant_freq = quant.dominant().map(|p| p.freq),
            dimension = quant.ref_dimension.name(),
            "recurrence quantified"
        );
    }

    fn permutation(&self, result: &PermutationResult) {
        info!(
            perms = result.num_perms(),
            bins = result.freqs.len(),
            ci = result.confidence_interval().is_some(),
            dimension = result.ref_dimension.name(),
            "level-1 permutation spectra"
        );
    }

    fn group(&self, result: &GroupResult) {
        let min_p = result.p_values.iter().copied().fold(f64::INFINITY, f64::min);
        info!(
            participants = result.n_participants,
            perms = result.null.nrows(),
            min_p,
            "level-2 group statistics"
        );
    }
}
