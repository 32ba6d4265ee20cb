//! Call configuration.
//!
//! Each public operation takes a plain option struct ([`WarpConfig`],
//! [`QuantifyConfig`], [`StatsConfig`], [`GroupStatsConfig`]).  All fields are
//! `pub` and have documented defaults, so the usual way to build one is
//! struct-update syntax:
//!
//! ```
//! use braintime::{WarpConfig, WarpMethod};
//!
//! let cfg = WarpConfig {
//!     method: WarpMethod::Waveshape,
//!     bts_rate: Some(128.0),
//!     ..WarpConfig::default()
//! };
//! ```
//!
//! At call entry the struct is resolved exactly once into a `Resolved*`
//! record: defaults that depend on the input are filled in and everything is
//! validated.  The rest of the call only sees the resolved record.
use crate::error::{BrainTimeError, Result};

// ── Closed option sets ────────────────────────────────────────────────────

/// How the template phase is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarpMethod {
    /// Linear phase ramp: a perfectly stationary sinusoid.
    #[default]
    Stationary,
    /// Phase of the carrier's tiled average waveshape.
    Waveshape,
}

/// Which phase estimate of the carrier drives the warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseMethod {
    #[default]
    Fft,
    /// Generalized-eigendecomposition phase (must be supplied by the source).
    Ged,
}

/// Windowing convention of the carrier phase estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutMethod {
    /// Phase covers exactly the analysis window.
    #[default]
    ConsistentTime,
    /// Phase covers the analysis window plus one carrier cycle on each side;
    /// the padding cycles are warped and then trimmed.
    CutArtefact,
}

/// Unit of the TGM axes, which sets the unit of the spectral axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RefDimension {
    /// Axes in seconds; frequencies in Hz.
    #[default]
    ClockTime,
    /// Axes in carrier cycles; frequencies in recurrences per cycle.
    BrainTime { carrier_freq: f64 },
}

impl RefDimension {
    /// Samples per axis unit, given the TGM's samples per second(-equivalent).
    pub fn spectral_rate(&self, sample_rate: f64) -> f64 {
        match *self {
            RefDimension::ClockTime => sample_rate,
            RefDimension::BrainTime { carrier_freq } => sample_rate / carrier_freq,
        }
    }

    /// Convert a frequency range in Hz to this dimension's spectral unit.
    pub fn scale_range(&self, (lo, hi): (f64, f64)) -> (f64, f64) {
        match *self {
            RefDimension::ClockTime => (lo, hi),
            RefDimension::BrainTime { carrier_freq } => (lo / carrier_freq, hi / carrier_freq),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RefDimension::ClockTime => "clocktime",
            RefDimension::BrainTime { .. } => "braintime",
        }
    }

    fn validate(&self) -> Result<()> {
        if let RefDimension::BrainTime { carrier_freq } = *self {
            if !(carrier_freq > 0.0 && carrier_freq.is_finite()) {
                return Err(BrainTimeError::config(
                    "ref_dimension",
                    format!("BrainTime carrier_freq must be > 0, got {carrier_freq}"),
                ));
            }
        }
        Ok(())
    }
}

// ── Warping ───────────────────────────────────────────────────────────────

/// Options for [`crate::warp::clock_to_brain`].
#[derive(Debug, Clone, PartialEq)]
pub struct WarpConfig {
    /// Remove the carrier component from the data before warping.
    ///
    /// `None` removes it when the source is a decomposed component of the
    /// data and skips otherwise.  `Some(true)` on a source that is not a
    /// component fails with [`BrainTimeError::UnsupportedRemoval`].  Skipping
    /// removal records a circularity warning.
    ///
    /// Default: `None`.
    pub remove_component: Option<bool>,

    /// Template construction.  Default: [`WarpMethod::Stationary`].
    pub method: WarpMethod,

    /// Phase estimate used for alignment.  Default: [`PhaseMethod::Fft`].
    pub phase_method: PhaseMethod,

    /// Hand every trial's warping path to the reporter.  Default: `false`.
    pub visual_check: bool,

    /// Output sampling rate in samples per second-equivalent.
    ///
    /// Default: `None` (the data's own sampling rate).
    pub bts_rate: Option<f64>,

    /// Worker threads for the per-trial loop.  Default: `None` (all cores).
    pub workers: Option<usize>,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            remove_component: None,
            method: WarpMethod::Stationary,
            phase_method: PhaseMethod::Fft,
            visual_check: false,
            bts_rate: None,
            workers: None,
        }
    }
}

/// [`WarpConfig`] after defaults and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWarp {
    pub remove_component: bool,
    pub method: WarpMethod,
    pub phase_method: PhaseMethod,
    pub visual_check: bool,
    pub phs_sr: f64,
    pub workers: Option<usize>,
}

impl WarpConfig {
    /// Resolve against the data's sampling rate and the source's origin.
    pub fn resolve(&self, data_sfreq: f64, source_is_component: bool) -> Result<ResolvedWarp> {
        let phs_sr = self.bts_rate.unwrap_or(data_sfreq);
        if !(phs_sr > 0.0 && phs_sr.is_finite()) {
            return Err(BrainTimeError::config(
                "bts_rate",
                format!("output sampling rate must be > 0, got {phs_sr}"),
            ));
        }
        validate_workers(self.workers)?;

        let remove_component = match (self.remove_component, source_is_component) {
            (Some(true), false) => return Err(BrainTimeError::UnsupportedRemoval),
            (Some(explicit), _) => explicit,
            (None, is_comp) => is_comp,
        };

        Ok(ResolvedWarp {
            remove_component,
            method: self.method,
            phase_method: self.phase_method,
            visual_check: self.visual_check,
            phs_sr,
            workers: self.workers,
        })
    }
}

// ── Quantification ────────────────────────────────────────────────────────

/// Options for [`crate::quantify::quantify_tgm`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifyConfig {
    /// Unit of the TGM axes.  Default: [`RefDimension::ClockTime`].
    pub ref_dimension: RefDimension,

    /// TGM samples per second (per second-equivalent in brain time).
    ///
    /// Default: `128.0`.
    pub sample_rate: f64,

    /// Frequency range searched for peaks, in Hz like `stats_range`; divided
    /// by the carrier frequency in brain time.  Default: `None` (first
    /// non-DC bin up to Nyquist).
    pub foi: Option<(f64, f64)>,

    /// Send the AC map and peaks to the reporter.  Default: `false`.
    pub figure: bool,
}

impl Default for QuantifyConfig {
    fn default() -> Self {
        Self {
            ref_dimension: RefDimension::ClockTime,
            sample_rate: 128.0,
            foi: None,
            figure: false,
        }
    }
}

/// [`QuantifyConfig`] after defaults and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuantify {
    pub ref_dimension: RefDimension,
    /// Samples per spectral unit.
    pub rate: f64,
    pub foi: (f64, f64),
    pub figure: bool,
}

impl QuantifyConfig {
    /// Resolve for a TGM whose side length is `n`.
    pub fn resolve(&self, n: usize) -> Result<ResolvedQuantify> {
        validate_rate(self.sample_rate)?;
        self.ref_dimension.validate()?;
        if n < 3 {
            return Err(BrainTimeError::shape("TGM side length", ">= 3", n));
        }
        let rate = self.ref_dimension.spectral_rate(self.sample_rate);
        let foi = match self.foi {
            Some(range) => self.ref_dimension.scale_range(validate_range("foi", range)?),
            None => (rate / n as f64, rate / 2.0),
        };
        Ok(ResolvedQuantify {
            ref_dimension: self.ref_dimension,
            rate,
            foi,
            figure: self.figure,
        })
    }
}

// ── Statistics ────────────────────────────────────────────────────────────

/// Options for [`crate::stats::stats_level1`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatsConfig {
    /// Unit of the TGM axes.  Default: [`RefDimension::ClockTime`].
    pub ref_dimension: RefDimension,

    /// TGM samples per second(-equivalent).  Default: `128.0`.
    pub sample_rate: f64,

    /// Frequency range of interest in Hz.  Divided by the carrier frequency
    /// in brain time.  Default: `(1, 30)`.
    pub stats_range: (u32, u32),

    /// Z-score empirical and permuted TGMs by the null distribution's
    /// mean and standard deviation.  Default: `true`.
    pub normalize: bool,

    /// Label permutations per participant.  Default: `500`.
    pub num_perms1: usize,

    /// Base seed of the permutation RNG streams.  Default: `0`.
    pub seed: u64,

    /// Worker threads for the permutation loop.  Default: `None` (all cores).
    pub workers: Option<usize>,

    /// Send the spectra to the reporter.  Default: `false`.
    pub figure: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            ref_dimension: RefDimension::ClockTime,
            sample_rate: 128.0,
            stats_range: (1, 30),
            normalize: true,
            num_perms1: 500,
            seed: 0,
            workers: None,
            figure: false,
        }
    }
}

/// [`StatsConfig`] after defaults and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStats {
    pub ref_dimension: RefDimension,
    pub rate: f64,
    /// `stats_range` in the spectral unit of `ref_dimension`.
    pub range: (f64, f64),
    pub normalize: bool,
    pub num_perms: usize,
    pub seed: u64,
    pub workers: Option<usize>,
    pub figure: bool,
}

impl StatsConfig {
    pub fn resolve(&self) -> Result<ResolvedStats> {
        validate_rate(self.sample_rate)?;
        self.ref_dimension.validate()?;
        validate_workers(self.workers)?;
        if self.num_perms1 == 0 {
            return Err(BrainTimeError::config("num_perms1", "must be at least 1"));
        }
        let (lo, hi) = self.stats_range;
        let range = validate_range("stats_range", (lo as f64, hi as f64))?;
        Ok(ResolvedStats {
            ref_dimension: self.ref_dimension,
            rate: self.ref_dimension.spectral_rate(self.sample_rate),
            range: self.ref_dimension.scale_range(range),
            normalize: self.normalize,
            num_perms: self.num_perms1,
            seed: self.seed,
            workers: self.workers,
            figure: self.figure,
        })
    }
}

/// Options for [`crate::stats::stats_level2`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatsConfig {
    /// Group-level null spectra drawn.  Default: `100_000`.
    pub num_perms2: usize,
    /// Default: `0`.
    pub seed: u64,
    /// Default: `None` (all cores).
    pub workers: Option<usize>,
    /// Send the group spectra to the reporter.  Default: `false`.
    pub figure: bool,
}

impl Default for GroupStatsConfig {
    fn default() -> Self {
        Self { num_perms2: 100_000, seed: 0, workers: None, figure: false }
    }
}

impl GroupStatsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_perms2 == 0 {
            return Err(BrainTimeError::config("num_perms2", "must be at least 1"));
        }
        validate_workers(self.workers)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn validate_rate(rate: f64) -> Result<()> {
    if rate > 0.0 && rate.is_finite() {
        Ok(())
    } else {
        Err(BrainTimeError::config("sample_rate", format!("must be > 0, got {rate}")))
    }
}

fn validate_workers(workers: Option<usize>) -> Result<()> {
    match workers {
        Some(0) => Err(BrainTimeError::config("workers", "must be at least 1 (or None)")),
        _ => Ok(()),
    }
}

fn validate_range(param: &'static str, (lo, hi): (f64, f64)) -> Result<(f64, f64)> {
    if lo >= 0.0 && hi > lo {
        Ok((lo, hi))
    } else {
        Err(BrainTimeError::config(param, format!("need 0 <= lo < hi, got [{lo}, {hi}]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warp_defaults_to_data_rate() {
        let r = WarpConfig::default().resolve(256.0, false).unwrap();
        assert_eq!(r.phs_sr, 256.0);
        assert!(!r.remove_component);
    }

    #[test]
    fn component_removed_by_default() {
        let r = WarpConfig::default().resolve(256.0, true).unwrap();
        assert!(r.remove_component);
        let off = WarpConfig { remove_component: Some(false), ..WarpConfig::default() };
        assert!(!off.resolve(256.0, true).unwrap().remove_component);
    }

    #[test]
    fn explicit_removal_needs_component() {
        let cfg = WarpConfig { remove_component: Some(true), ..WarpConfig::default() };
        assert_eq!(cfg.resolve(256.0, false), Err(BrainTimeError::UnsupportedRemoval));
    }

    #[test]
    fn braintime_rescales_range() {
        let cfg = StatsConfig {
            ref_dimension: RefDimension::BrainTime { carrier_freq: 8.0 },
            stats_range: (2, 16),
            ..StatsConfig::default()
        };
        let r = cfg.resolve().unwrap();
        assert_eq!(r.range, (0.25, 2.0));
        assert_eq!(r.rate, 16.0);

        let q = QuantifyConfig {
            ref_dimension: cfg.ref_dimension,
            foi: Some((2.0, 16.0)),
            ..QuantifyConfig::default()
        };
        assert_eq!(q.resolve(64).unwrap().foi, r.range);
    }

    #[test]
    fn zero_permutations_rejected() {
        let cfg = StatsConfig { num_perms1: 0, ..StatsConfig::default() };
        assert!(matches!(
            cfg.resolve(),
            Err(BrainTimeError::InvalidConfig { param: "num_perms1", .. })
        ));
    }

    #[test]
    fn quantify_default_foi_spans_to_nyquist() {
        let r = QuantifyConfig::default().resolve(64).unwrap();
        assert_eq!(r.foi, (2.0, 64.0));
    }
}
