//! Error type shared by every stage of the pipeline.
//!
//! All variants are fatal: the call that produced them returns no partial
//! output.  Recoverable conditions go to [`crate::diagnostics::Diagnostics`]
//! instead.
use thiserror::Error;

/// Fatal conditions raised by warping, quantification and statistics.
///
/// Each message names the offending parameter and the option to change.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrainTimeError {
    #[error(
        "remove_component = Some(true) but the warping source is not a decomposed \
         component of the data; set remove_component to None or Some(false)"
    )]
    UnsupportedRemoval,

    #[error(
        "trial {trial}: phase has {phase_len} samples but data has {data_len} \
         (difference > 10); check that the warping source was computed on the \
         same time window and sampling rate as the data"
    )]
    PhaseLengthMismatch {
        trial: usize,
        phase_len: usize,
        data_len: usize,
    },

    #[error(
        "average waveshape has {troughs} trough(s) after smoothing, exactly 2 are \
         required; use method = WarpMethod::Stationary instead"
    )]
    InsufficientSignalQuality { troughs: usize },

    #[error(
        "trial {trial}: GED phase has {ged_len} samples, FFT phase has {fft_len} \
         (more than 5% apart); recompute the GED source or use \
         phase_method = PhaseMethod::Fft"
    )]
    GedPhaseLengthMismatch {
        trial: usize,
        ged_len: usize,
        fft_len: usize,
    },

    #[error(
        "phase_method = PhaseMethod::Ged but the warping source carries no GED \
         phase; use phase_method = PhaseMethod::Fft"
    )]
    MissingGedPhase,

    #[error(
        "{axis} {index} of the autocorrelation map has no spectral peak in \
         [{f_lo}, {f_hi}]; widen foi or check the TGM sampling rate"
    )]
    NoSpectralPeak {
        axis: &'static str,
        index: usize,
        f_lo: f64,
        f_hi: f64,
    },

    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    #[error("invalid configuration `{param}`: {reason}")]
    InvalidConfig { param: &'static str, reason: String },

    #[error("classifier failed on permutation {perm}: {message}")]
    Classifier { perm: usize, message: String },
}

impl BrainTimeError {
    pub(crate) fn config(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig { param, reason: reason.into() }
    }

    pub(crate) fn shape(
        what: &'static str,
        expected: impl std::fmt::Debug,
        got: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: format!("{expected:?}"),
            got: format!("{got:?}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrainTimeError>;
