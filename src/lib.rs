//! # braintime — brain time warping and TGM recurrence statistics
//!
//! `braintime` resamples neural trials so that a chosen carrier oscillation
//! advances linearly in time ("brain time"), then quantifies how decoded
//! patterns recur across time in the warped axis.
//!
//! ## Pipeline overview
//!
//! ```text
//! TrialSet + WarpingSource (carrier phase, freq, window, cut, waveshape)
//!   │
//!   ├─ warp::clock_to_brain()        DTW phase alignment, per-cycle resize
//!   │     └─→ WarpedData             identical length and time axis per trial
//!   │
//!   ├─ (external classifier)         TGM [train time, test time]
//!   │
//!   ├─ quantify::quantify_tgm()      AC map + dominant peak per row/column
//!   ├─ stats::stats_level1()         label permutations → null spectra
//!   └─ stats::stats_level2()         group null spectra → p-values
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use braintime::{clock_to_brain, CutMethod, SourceOrigin, TrialSet, WarpConfig, WarpingSource};
//!
//! # fn run(trials: TrialSet, phase: Vec<Vec<f64>>) -> braintime::Result<()> {
//! let source = WarpingSource {
//!     phase,
//!     ged_phase: None,
//!     freq: 8.0,
//!     time_window: (0.0, 4.0),
//!     cut: CutMethod::ConsistentTime,
//!     waveshape: None,
//!     origin: SourceOrigin::Channel("Oz".into()),
//! };
//! let cfg = WarpConfig { bts_rate: Some(128.0), ..WarpConfig::default() };
//! let warped = clock_to_brain(&trials, &source, &cfg)?;
//! assert_eq!(warped.n_samples(), 512);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use braintime::autocorr::autocorr2d;
//! use braintime::spectral::power_spectrum;
//! use ndarray::Array2;
//!
//! let tgm: Array2<f64> = Array2::zeros((64, 64));
//! let ac = autocorr2d(tgm.view());
//! let row: Vec<f64> = ac.row(32).to_vec();
//! let spec = power_spectrum(&row, 128.0, (2.0, 30.0)).unwrap();
//! ```
//!
//! Logging goes through `tracing`; install a subscriber (the binaries use
//! `tracing_subscriber` with `RUST_LOG`) to see it.

pub mod autocorr;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod dtw;
pub mod error;
pub mod io;
pub mod logging;
pub mod normalize;
pub mod parallel;
pub mod phase;
pub mod quantify;
pub mod report;
pub mod resize;
pub mod spectral;
pub mod stats;
pub mod trial;
pub mod warp;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `braintime::Foo` without having to know the internal module layout.

// config
pub use config::{
    CutMethod, GroupStatsConfig, PhaseMethod, QuantifyConfig, RefDimension, StatsConfig,
    WarpConfig, WarpMethod,
};

// errors and warnings
pub use diagnostics::{Diagnostics, Warning};
pub use error::{BrainTimeError, Result};

// data
pub use trial::{ComponentDecomposition, Label, SourceOrigin, Trial, TrialSet, WarpingSource};

// warping
pub use dtw::{dtw, WarpPath};
pub use warp::{clock_to_brain, clock_to_brain_with_reporter, WarpedData};

// recurrence
pub use autocorr::autocorr2d;
pub use quantify::{quantify_tgm, quantify_tgm_with_reporter, Quantification};
pub use spectral::{power_spectrum, SpectralPeak, Spectrum};

// statistics
pub use classify::Classifier;
pub use stats::{
    stats_level1, stats_level1_with_reporter, stats_level2, stats_level2_with_reporter,
    ConfidenceInterval, GroupResult, PermutationResult,
};

// reporting
pub use report::{LogReporter, NullReporter, Reporter};
