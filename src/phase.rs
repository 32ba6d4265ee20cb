//! Phase helpers: analytic signal, unwrapping, smoothing.
//!
//! The Hilbert transform follows the usual FFT construction (as in
//! `scipy.signal.hilbert`): zero the negative frequencies, double the
//! positive ones, keep DC and Nyquist.
use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

/// Analytic signal of `x`.
pub fn hilbert(x: &[f64]) -> Vec<Complex<f64>> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex { re: v, im: 0.0 }).collect();
    planner.plan_fft_forward(n).process(&mut buf);

    // h = [1, 2, …, 2, (1 if n even), 0, …, 0]
    let half = n / 2;
    let pos_end = if n % 2 == 0 { half } else { half + 1 };
    for v in &mut buf[1..pos_end] {
        *v *= 2.0;
    }
    for v in &mut buf[half + 1..] {
        *v = Complex::default();
    }

    planner.plan_fft_inverse(n).process(&mut buf);
    let inv = 1.0 / n as f64;
    buf.iter_mut().for_each(|v| *v *= inv);
    buf
}

/// Instantaneous phase (radians, wrapped to `(-π, π]`) of `x`.
pub fn instantaneous_phase(x: &[f64]) -> Vec<f64> {
    hilbert(x).iter().map(|c| c.arg()).collect()
}

/// Remove `2π` jumps: whenever consecutive samples differ by more than `π`,
/// shift everything after by the multiple of `2π` that brings the step back
/// into `[-π, π]`.
///
/// Idempotent on an already unwrapped trajectory whose steps stay below `π`.
pub fn unwrap(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let mut correction = 0.0;
    let mut prev: Option<f64> = None;
    for &p in phase {
        if let Some(q) = prev {
            let d = p - q;
            if d.abs() > PI {
                correction -= 2.0 * PI * ((d + PI) / (2.0 * PI)).floor();
            }
        }
        prev = Some(p);
        out.push(p + correction);
    }
    out
}

/// Centred moving average with `span` points (odd), shrinking near the edges
/// so that the first and last samples are left untouched.
pub fn smooth(x: &[f64], span: usize) -> Vec<f64> {
    let n = x.len();
    let half = span.max(1) / 2;
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            let window = &x[i - h..=i + h];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Indices of local minima (see [`crate::spectral::find_peaks`]).
pub fn find_troughs(x: &[f64]) -> Vec<usize> {
    let neg: Vec<f64> = x.iter().map(|v| -v).collect();
    crate::spectral::find_peaks(&neg)
}

/// Evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
