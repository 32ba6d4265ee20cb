//! Clock-to-brain time warping.
//!
//! Each trial is resampled so that the chosen carrier's phase advances
//! linearly in the new time axis: every carrier cycle ends up with the same
//! number of samples.
//!
//! # Algorithm (per call)
//! ```text
//! resolve config (once)
//! remove carrier component from the data     (if a component, by default)
//! redefine trials to the analysis window     (+1 cycle each side for CutArtefact)
//! build template phase                       (stationary ramp or waveshape phase)
//! per trial:
//!   unwrap phase, reconcile phase/data length
//!   DTW(phase, template)         → path (ix, iy)
//!   walk iy                      → cycle boundaries
//!   resize each cycle's samples  → template samples it spans
//!                                  (cycle_dur, less for a partial last cycle)
//!   resize concatenation         → phs_sr · duration samples
//! trim padding cycles                        (CutArtefact)
//! ```
//!
//! With `duration = t1 − t0`:
//! ```text
//! n_cycles  = freq · duration
//! out_len   = round(phs_sr · duration)
//! cycle_dur = round(out_len / n_cycles)
//! ```
use std::f64::consts::PI;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{CutMethod, PhaseMethod, ResolvedWarp, WarpConfig, WarpMethod};
use crate::diagnostics::{Diagnostics, Warning};
use crate::dtw::{dtw, WarpPath};
use crate::error::{BrainTimeError, Result};
use crate::parallel;
use crate::phase::{find_troughs, instantaneous_phase, linspace, smooth, unwrap};
use crate::report::{NullReporter, Reporter};
use crate::resize::{resize, resize_1d};
use crate::trial::{Label, SourceOrigin, Trial, TrialSet, WarpingSource};

/// Span of the moving average applied to the average waveshape.
const WAVESHAPE_SMOOTH_SPAN: usize = 5;
/// Largest phase/data length difference that is corrected silently.
const SILENT_MISMATCH: usize = 1;
/// Largest phase/data length difference that is corrected at all.
const MAX_MISMATCH: usize = 10;
/// Largest relative GED/FFT phase length difference.
const MAX_GED_MISMATCH: f64 = 0.05;

// ── Output ────────────────────────────────────────────────────────────────

/// Brain-time-warped trials.
///
/// Every trial has `time.len()` samples and the same time vector.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpedData {
    pub trials: Vec<Trial>,
    /// Shared time axis in second-equivalents (one carrier cycle = `1/warp_freq`).
    pub time: Vec<f64>,
    /// Output sampling rate (samples per second-equivalent).
    pub sfreq: f64,
    pub channels: Vec<String>,
    /// Carrier frequency in Hz.
    pub warp_freq: f64,
    /// Cycles in the output (padding cycles excluded).
    pub n_cycles: f64,
    /// Samples per cycle before the final resize.
    pub cycle_dur: usize,
    pub method: WarpMethod,
    pub cut: CutMethod,
    /// Clock-time window the carrier phase refers to.
    pub phase_window: (f64, f64),
    pub component_removed: bool,
    pub diagnostics: Diagnostics,
}

impl WarpedData {
    pub fn n_samples(&self) -> usize {
        self.time.len()
    }

    /// Labels in trial order.
    pub fn labels(&self) -> Vec<Label> {
        self.trials.iter().map(Trial::label).collect()
    }

    /// View as a [`TrialSet`] for downstream classification.
    pub fn to_trial_set(&self) -> TrialSet {
        TrialSet {
            trials: self.trials.clone(),
            sfreq: self.sfreq,
            channels: self.channels.clone(),
        }
    }
}

/// Template phase shared by all trials of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Unwrapped phase, `out_len` samples.
    pub phase: Vec<f64>,
    pub n_cycles: f64,
    pub cycle_dur: usize,
}

/// Result of warping one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialWarp {
    /// `[C, out_len]`.
    pub data: Array2<f64>,
    pub path: WarpPath,
    /// Path positions (into `path.ix`) that end each cycle.
    pub boundaries: Vec<usize>,
}

// ── Templates ─────────────────────────────────────────────────────────────

/// Linear phase ramp from `−π` to `2π·n_cycles − π` over `n_samples`.
pub fn stationary_template(n_cycles: f64, n_samples: usize) -> Vec<f64> {
    linspace(-PI, 2.0 * PI * n_cycles - PI, n_samples)
}

/// Phase of the average waveshape tiled to `n_cycles` cycles.
///
/// The smoothed waveshape must have exactly two troughs; the samples from the
/// first up to (not including) the second form one cycle.  The cycle is tiled
/// `floor(n_cycles)` times and the leading fraction of one more cycle is
/// appended.  The analytic phase of that signal, unwrapped, is resized to
/// `n_samples`.
pub fn waveshape_template(waveshape: &[f64], n_cycles: f64, n_samples: usize) -> Result<Vec<f64>> {
    let smoothed = smooth(waveshape, WAVESHAPE_SMOOTH_SPAN);
    let troughs = find_troughs(&smoothed);
    let &[first, second] = troughs.as_slice() else {
        return Err(BrainTimeError::InsufficientSignalQuality { troughs: troughs.len() });
    };
    let cycle = &smoothed[first..second];

    let whole = n_cycles.floor() as usize;
    let partial = ((n_cycles - n_cycles.floor()) * cycle.len() as f64).round() as usize;
    let mut tiled = Vec::with_capacity(whole * cycle.len() + partial);
    for _ in 0..whole {
        tiled.extend_from_slice(cycle);
    }
    tiled.extend_from_slice(&cycle[..partial.min(cycle.len())]);

    let phase = unwrap(&instantaneous_phase(&tiled));
    Ok(resize_1d(&phase, n_samples))
}

// ── Per-trial warp ────────────────────────────────────────────────────────

/// Path positions where a cycle ends.
///
/// Position `k` ends a cycle when template index `iy[k] + 1` is a multiple of
/// `cycle_dur` and the path moves on to the next template index; the last
/// position always ends a cycle.
pub fn cycle_boundaries(iy: &[usize], cycle_dur: usize) -> Vec<usize> {
    let Some(last) = iy.len().checked_sub(1) else {
        return vec![];
    };
    let mut out: Vec<usize> = (0..last)
        .filter(|&k| (iy[k] + 1) % cycle_dur == 0 && iy[k + 1] != iy[k])
        .collect();
    out.push(last);
    out
}

/// Warp one trial's `[C, n]` data given its unwrapped phase (length `n`).
pub fn warp_trial(
    data: ArrayView2<'_, f64>,
    phase: &[f64],
    template: &Template,
) -> Result<TrialWarp> {
    if data.ncols() != phase.len() {
        return Err(BrainTimeError::shape("trial phase length", data.ncols(), phase.len()));
    }
    let path = dtw(phase, &template.phase)?;
    let boundaries = cycle_boundaries(&path.iy, template.cycle_dur);

    // Each range is stretched to the template samples it covers: `cycle_dur`
    // for whole cycles, fewer for a trailing partial cycle.
    let mut cycles = Vec::with_capacity(boundaries.len());
    let mut start = 0;
    for &end in &boundaries {
        let cycle = data.select(Axis(1), &path.ix[start..=end]);
        let span = path.iy[end] - path.iy[start] + 1;
        cycles.push(resize(cycle.view(), span));
        start = end + 1;
    }
    let views: Vec<ArrayView2<'_, f64>> = cycles.iter().map(|c| c.view()).collect();
    let joined = concatenate(Axis(1), &views)
        .map_err(|e| BrainTimeError::shape("warped cycles", "equal channel counts", e.to_string()))?;

    Ok(TrialWarp {
        data: resize(joined.view(), template.phase.len()),
        path,
        boundaries,
    })
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Warp every trial of `data` to brain time using `source`'s carrier.
pub fn clock_to_brain(
    data: &TrialSet,
    source: &WarpingSource,
    cfg: &WarpConfig,
) -> Result<WarpedData> {
    clock_to_brain_with_reporter(data, source, cfg, &NullReporter)
}

/// [`clock_to_brain`], handing warping paths to `reporter` when
/// `cfg.visual_check` is on.
pub fn clock_to_brain_with_reporter(
    data: &TrialSet,
    source: &WarpingSource,
    cfg: &WarpConfig,
    reporter: &dyn Reporter,
) -> Result<WarpedData> {
    let rc = cfg.resolve(data.sfreq, source.is_component())?;
    validate_source(data, source)?;
    let mut diagnostics = Diagnostics::new();

    let phase_rows = select_phase(source, rc.phase_method)?;

    // Component removal happens on a copy; the caller's data is untouched.
    let mut data = data.clone();
    let component_removed = match (&source.origin, rc.remove_component) {
        (SourceOrigin::Component { index, decomposition }, true) => {
            for trial in &mut data.trials {
                decomposition.remove_from(&mut trial.data, *index)?;
            }
            info!(component = index, "removed carrier component from data");
            true
        }
        _ => false,
    };

    let period = 1.0 / source.freq;
    let (t0, t1) = source.time_window;
    let (w0, w1, phase_window) = match source.cut {
        CutMethod::ConsistentTime => (t0, t1, (t0, t1)),
        CutMethod::CutArtefact => (
            t0 - period,
            t1 + period,
            (t0 - 0.5 * period, t1 + 0.5 * period),
        ),
    };
    let data = data.redefine(w0, w1)?;

    let template = build_template(source, &rc, w1 - w0)?;
    debug!(
        n_cycles = template.n_cycles,
        cycle_dur = template.cycle_dur,
        out_len = template.phase.len(),
        "template ready"
    );

    let trim = match source.cut {
        CutMethod::ConsistentTime => 0,
        CutMethod::CutArtefact => (rc.phs_sr * period).round() as usize,
    };
    let out_len = template.phase.len();
    if 2 * trim >= out_len {
        return Err(BrainTimeError::config(
            "time_window",
            "window too short to trim one padding cycle from each side",
        ));
    }
    let kept = out_len - 2 * trim;
    let offset = match source.cut {
        CutMethod::ConsistentTime => 0.0,
        CutMethod::CutArtefact => period,
    };
    let time: Vec<f64> = (0..kept).map(|s| s as f64 / rc.phs_sr + offset).collect();

    let results: Vec<Result<(TrialWarp, Option<Warning>)>> = parallel::install(rc.workers, || {
        data.trials
            .par_iter()
            .zip(phase_rows.par_iter())
            .enumerate()
            .map(|(i, (trial, phase))| warp_one(i, trial, phase, &template))
            .collect()
    })?;

    let mut trials = Vec::with_capacity(results.len());
    for (i, (result, trial)) in results.into_iter().zip(&data.trials).enumerate() {
        let (warp, warning) = result?;
        if let Some(w) = warning {
            diagnostics.push(w);
        }
        if rc.visual_check {
            reporter.warp_path(i, &warp.path, &warp.boundaries);
        }
        let kept_data = warp.data.slice(s![.., trim..trim + kept]).to_owned();
        trials.push(Trial::new(kept_data, time.clone(), trial.label())?);
    }

    if !component_removed {
        let reason = match (&source.origin, cfg.remove_component) {
            (SourceOrigin::Component { .. }, _) => {
                "carrier component was not removed from the data (remove_component = Some(false))"
            }
            _ => "carrier was taken from the data it warps; results may be circular",
        };
        diagnostics.push(Warning::Circularity { reason: reason.to_string() });
    }

    let n_cycles = match source.cut {
        CutMethod::ConsistentTime => template.n_cycles,
        CutMethod::CutArtefact => template.n_cycles - 2.0,
    };
    info!(
        trials = trials.len(),
        samples = kept,
        n_cycles,
        warnings = diagnostics.warnings().len(),
        "clock-to-brain warp done"
    );

    Ok(WarpedData {
        trials,
        time,
        sfreq: rc.phs_sr,
        channels: data.channels.clone(),
        warp_freq: source.freq,
        n_cycles,
        cycle_dur: template.cycle_dur,
        method: rc.method,
        cut: source.cut,
        phase_window,
        component_removed,
        diagnostics,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn validate_source(data: &TrialSet, source: &WarpingSource) -> Result<()> {
    if !(source.freq > 0.0 && source.freq.is_finite()) {
        return Err(BrainTimeError::config("freq", format!("carrier frequency must be > 0, got {}", source.freq)));
    }
    if source.duration() <= 0.0 {
        return Err(BrainTimeError::config(
            "time_window",
            format!("need t0 < t1, got {:?}", source.time_window),
        ));
    }
    if source.phase.len() != data.len() {
        return Err(BrainTimeError::shape("phase rows (one per trial)", data.len(), source.phase.len()));
    }
    Ok(())
}

fn select_phase(source: &WarpingSource, method: PhaseMethod) -> Result<&[Vec<f64>]> {
    match method {
        PhaseMethod::Fft => Ok(&source.phase),
        PhaseMethod::Ged => {
            let ged = source.ged_phase.as_ref().ok_or(BrainTimeError::MissingGedPhase)?;
            if ged.len() != source.phase.len() {
                return Err(BrainTimeError::shape("GED phase rows", source.phase.len(), ged.len()));
            }
            for (trial, (g, f)) in ged.iter().zip(&source.phase).enumerate() {
                let rel = g.len().abs_diff(f.len()) as f64 / f.len().max(1) as f64;
                if rel > MAX_GED_MISMATCH {
                    return Err(BrainTimeError::GedPhaseLengthMismatch {
                        trial,
                        ged_len: g.len(),
                        fft_len: f.len(),
                    });
                }
            }
            Ok(ged)
        }
    }
}

fn build_template(source: &WarpingSource, rc: &ResolvedWarp, duration: f64) -> Result<Template> {
    let n_cycles = source.freq * duration;
    let out_len = (rc.phs_sr * duration).round() as usize;
    let cycle_dur = (out_len as f64 / n_cycles).round() as usize;
    if out_len < 2 || cycle_dur == 0 {
        return Err(BrainTimeError::config(
            "bts_rate",
            format!(
                "{} samples/s over {duration} s gives {out_len} samples and {cycle_dur} per cycle; \
                 raise bts_rate",
                rc.phs_sr
            ),
        ));
    }

    let phase = match rc.method {
        WarpMethod::Stationary => stationary_template(n_cycles, out_len),
        WarpMethod::Waveshape => {
            let shape = source.waveshape.as_deref().ok_or_else(|| {
                BrainTimeError::config(
                    "method",
                    "WarpMethod::Waveshape needs the source's average waveshape; \
                     use WarpMethod::Stationary",
                )
            })?;
            waveshape_template(shape, n_cycles, out_len)?
        }
    };
    Ok(Template { phase, n_cycles, cycle_dur })
}

/// Reconcile lengths and warp one trial.
fn warp_one(
    index: usize,
    trial: &Trial,
    raw_phase: &[f64],
    template: &Template,
) -> Result<(TrialWarp, Option<Warning>)> {
    let phase = unwrap(raw_phase);
    let (p_len, d_len) = (phase.len(), trial.n_samples());
    let diff = p_len.abs_diff(d_len);
    if diff > MAX_MISMATCH {
        return Err(BrainTimeError::PhaseLengthMismatch { trial: index, phase_len: p_len, data_len: d_len });
    }
    let warning = (diff > SILENT_MISMATCH).then_some(Warning::Recoverable {
        trial: index,
        phase_len: p_len,
        data_len: d_len,
    });

    // The tail of the longer series is dropped.
    let n = p_len.min(d_len);
    let warp = warp_trial(trial.data.slice(s![.., ..n]), &phase[..n], template)?;
    Ok((warp, warning))
}
