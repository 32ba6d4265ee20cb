/// Shared synthetic-signal generators for the integration tests.
use braintime::{CutMethod, Label, SourceOrigin, Trial, TrialSet, WarpingSource};
use ndarray::Array2;
use std::f64::consts::PI;

#[allow(unused)]
/// `n` samples at `sfreq` starting at t = 0.
pub fn time_axis(n: usize, sfreq: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / sfreq).collect()
}

#[allow(unused)]
/// Unwrapped phase of a stationary `freq` Hz oscillation, starting at −π.
pub fn linear_phase(freq: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| 2.0 * PI * freq * i as f64 / sfreq - PI).collect()
}

#[allow(unused)]
/// Phase whose instantaneous frequency wobbles by ±`depth`·`freq` once per second.
pub fn wobbling_phase(freq: f64, sfreq: f64, n: usize, depth: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 / sfreq;
            2.0 * PI * freq * t + depth * freq * (2.0 * PI * t).sin() - PI
        })
        .collect()
}

#[allow(unused)]
/// `n_trials` trials of `n_ch` channels, `n` samples each, labels alternating 1/2.
///
/// Channel `c` of trial `k` is a sine at `(c + 1)` Hz with a trial-dependent phase.
pub fn make_trials(n_trials: usize, n_ch: usize, n: usize, sfreq: f64) -> TrialSet {
    let time = time_axis(n, sfreq);
    let trials = (0..n_trials)
        .map(|k| {
            let data = Array2::from_shape_fn((n_ch, n), |(c, i)| {
                (2.0 * PI * (c + 1) as f64 * time[i] + k as f64 * 0.3).sin()
            });
            Trial::new(data, time.clone(), (k % 2) as Label + 1).unwrap()
        })
        .collect();
    let channels = (0..n_ch).map(|c| format!("E{c}")).collect();
    TrialSet::new(trials, sfreq, channels).unwrap()
}

#[allow(unused)]
/// Channel-origin warping source with FFT phase only.
pub fn channel_source(phase: Vec<Vec<f64>>, freq: f64, window: (f64, f64), cut: CutMethod) -> WarpingSource {
    WarpingSource {
        phase,
        ged_phase: None,
        freq,
        time_window: window,
        cut,
        waveshape: None,
        origin: SourceOrigin::Channel("Oz".into()),
    }
}

#[allow(unused)]
/// Separable cosine grid: `cos(2π·fx·i/rate) · cos(2π·fy·j/rate)`.
pub fn cos_grid(n: usize, fx: f64, fy: f64, rate: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| {
        (2.0 * PI * fx * i as f64 / rate).cos() * (2.0 * PI * fy * j as f64 / rate).cos()
    })
}

#[allow(unused)]
/// Maximum absolute difference between two arrays.
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}
