//! Trial containers and the carrier source metadata consumed by the warper.
use ndarray::{s, Array1, Array2, Axis};

use crate::config::CutMethod;
use crate::error::{BrainTimeError, Result};

/// Class label of a trial.
pub type Label = u32;

// ── Trial ─────────────────────────────────────────────────────────────────

/// One trial: `[C, T]` samples, a sample-aligned time vector (s) and a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub data: Array2<f64>,
    pub time: Vec<f64>,
    label: Label,
}

impl Trial {
    pub fn new(data: Array2<f64>, time: Vec<f64>, label: Label) -> Result<Self> {
        if data.ncols() != time.len() {
            return Err(BrainTimeError::shape("trial time vector", data.ncols(), time.len()));
        }
        Ok(Self { data, time, label })
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Keep the samples whose time lies in `[t0, t1]`.
    ///
    /// Bounds are widened by half a sample period so that window edges
    /// computed in floating point still select the intended samples.
    pub fn redefine(&self, t0: f64, t1: f64) -> Result<Trial> {
        let tol = match self.time.as_slice() {
            [a, b, ..] => 0.5 * (b - a).abs(),
            _ => 0.0,
        };
        let keep: Vec<usize> = self
            .time
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= t0 - tol && t <= t1 + tol)
            .map(|(i, _)| i)
            .collect();
        let (Some(&first), Some(&last)) = (keep.first(), keep.last()) else {
            return Err(BrainTimeError::config(
                "time_window",
                format!("[{t0}, {t1}] selects no samples of a trial spanning {:?}", self.span()),
            ));
        };
        Ok(Trial {
            data: self.data.slice(s![.., first..=last]).to_owned(),
            time: self.time[first..=last].to_vec(),
            label: self.label,
        })
    }

    fn span(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }
}

/// All trials of one session: shared channel layout and sampling rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSet {
    pub trials: Vec<Trial>,
    /// Sampling rate in Hz.
    pub sfreq: f64,
    pub channels: Vec<String>,
}

impl TrialSet {
    pub fn new(trials: Vec<Trial>, sfreq: f64, channels: Vec<String>) -> Result<Self> {
        if let Some(bad) = trials.iter().position(|t| t.data.nrows() != channels.len()) {
            return Err(BrainTimeError::ShapeMismatch {
                what: "trial channel count",
                expected: channels.len().to_string(),
                got: format!("{} (trial {bad})", trials[bad].data.nrows()),
            });
        }
        Ok(Self { trials, sfreq, channels })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.trials.iter().map(Trial::label).collect()
    }

    /// Redefine every trial to `[t0, t1]`, preserving order and labels.
    pub fn redefine(&self, t0: f64, t1: f64) -> Result<TrialSet> {
        let trials = self
            .trials
            .iter()
            .map(|t| t.redefine(t0, t1))
            .collect::<Result<Vec<_>>>()?;
        Ok(TrialSet { trials, sfreq: self.sfreq, channels: self.channels.clone() })
    }
}

// ── Component decomposition ──────────────────────────────────────────────

/// Linear unmixing of the sensor data, e.g. from ICA.
///
/// `mixing` is `[C, K]`, `unmixing` is `[K, C]`; component `k`'s activation
/// is `unmixing[k, :] · data` and its sensor projection `mixing[:, k] ⊗ act`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecomposition {
    pub mixing: Array2<f64>,
    pub unmixing: Array2<f64>,
}

impl ComponentDecomposition {
    pub fn new(mixing: Array2<f64>, unmixing: Array2<f64>) -> Result<Self> {
        if mixing.dim() != (unmixing.ncols(), unmixing.nrows()) {
            return Err(BrainTimeError::shape(
                "unmixing matrix",
                (mixing.ncols(), mixing.nrows()),
                unmixing.dim(),
            ));
        }
        Ok(Self { mixing, unmixing })
    }

    pub fn n_components(&self) -> usize {
        self.mixing.ncols()
    }

    /// Subtract component `k`'s sensor projection from `data` (`[C, T]`).
    pub fn remove_from(&self, data: &mut Array2<f64>, k: usize) -> Result<()> {
        if k >= self.n_components() {
            return Err(BrainTimeError::shape("component index", self.n_components(), k));
        }
        if data.nrows() != self.mixing.nrows() {
            return Err(BrainTimeError::shape("data channels", self.mixing.nrows(), data.nrows()));
        }
        let activation: Array1<f64> = self.unmixing.row(k).dot(&*data);
        let topo = self.mixing.column(k).insert_axis(Axis(1));
        let act = activation.insert_axis(Axis(0));
        *data -= &topo.dot(&act);
        Ok(())
    }
}

// ── Warping source ───────────────────────────────────────────────────────

/// Where the carrier was taken from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOrigin {
    /// A sensor channel, or anything external to the warped data.
    Channel(String),
    /// Component `index` of a decomposition of the warped data itself.
    Component {
        index: usize,
        decomposition: ComponentDecomposition,
    },
}

/// The chosen carrier oscillation: per-trial phase plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpingSource {
    /// FFT phase estimate, one row per trial (radians, wrapped or unwrapped).
    pub phase: Vec<Vec<f64>>,
    /// Optional GED phase estimate, one row per trial.
    pub ged_phase: Option<Vec<Vec<f64>>>,
    /// Carrier frequency in Hz.
    pub freq: f64,
    /// Analysis window `[t0, t1]` in seconds.
    pub time_window: (f64, f64),
    pub cut: CutMethod,
    /// Average waveshape of the carrier, at least one full cycle long.
    pub waveshape: Option<Vec<f64>>,
    pub origin: SourceOrigin,
}

impl WarpingSource {
    pub fn is_component(&self) -> bool {
        matches!(self.origin, SourceOrigin::Component { .. })
    }

    pub fn duration(&self) -> f64 {
        self.time_window.1 - self.time_window.0
    }
}
