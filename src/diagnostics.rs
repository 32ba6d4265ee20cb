//! Non-fatal warnings accumulated during a call.
//!
//! Every warning is logged through `tracing` when it is recorded and kept in
//! the returned [`Diagnostics`] so callers can inspect it programmatically.
use tracing::warn;

/// A recoverable condition; processing continued with the documented fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Phase and data lengths differed by 2–10 samples; the shorter was used.
    Recoverable {
        trial: usize,
        phase_len: usize,
        data_len: usize,
    },
    /// The carrier may not be independent of the warped data.
    Circularity { reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Recoverable { trial, phase_len, data_len } => write!(
                f,
                "trial {trial}: phase ({phase_len}) and data ({data_len}) lengths differ, \
                 truncated to the shorter"
            ),
            Warning::Circularity { reason } => write!(f, "possible circular inference: {reason}"),
        }
    }
}

/// Warnings collected over one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `w` and emit it at `WARN` level.
    pub fn push(&mut self, w: Warning) {
        warn!("{w}");
        self.warnings.push(w);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn has_circularity(&self) -> bool {
        self.warnings.iter().any(|w| matches!(w, Warning::Circularity { .. }))
    }

    pub fn recoverable_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::Recoverable { .. }))
            .count()
    }
}
