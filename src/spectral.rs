//! Hanning-tapered power spectra with nearest-bin band selection.
//!
//! Algorithm:
//!   1. Remove the mean of each observation.
//!   2. Multiply by a unit-energy Hanning taper (`0.5·(1 − cos(2πk/(n+1)))`,
//!      `k = 1..n`, no zero end points).
//!   3. FFT, one-sided power `|X_k|²` (doubled for bins other than DC and
//!      Nyquist).
//!   4. Average the observations.
//!   5. Keep bins `round(f_lo·n/rate) ..= round(f_hi·n/rate)`.
//!
//! Frequency resolution is `rate / n`.  Bins are never interpolated.
use std::f64::consts::PI;

use ndarray::ArrayView2;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::{BrainTimeError, Result};

/// Power values and their frequencies, restricted to a band.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub power: Vec<f64>,
    pub freqs: Vec<f64>,
}

/// Dominant local maximum of a spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    pub amplitude: f64,
    pub freq: f64,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Largest local maximum, or `None` if the spectrum is monotone or flat.
    pub fn dominant_peak(&self) -> Option<SpectralPeak> {
        find_peaks(&self.power)
            .into_iter()
            .max_by(|&a, &b| self.power[a].total_cmp(&self.power[b]))
            .map(|k| SpectralPeak { amplitude: self.power[k], freq: self.freqs[k] })
    }
}

/// Symmetric Hanning window without zero end points.
pub fn hanning(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|k| 0.5 * (1.0 - (2.0 * PI * k as f64 / (n + 1) as f64).cos()))
        .collect()
}

/// Inclusive bin range nearest to `[f_lo, f_hi]` for an `n`-point FFT.
pub fn band_bins(n: usize, rate: f64, (f_lo, f_hi): (f64, f64)) -> (usize, usize) {
    let nyq_bin = n / 2;
    let bin = |f: f64| ((f * n as f64 / rate).round().max(0.0) as usize).min(nyq_bin);
    (bin(f_lo), bin(f_hi))
}

/// Frequency axis of [`power_spectrum`] without computing any power.
pub fn band_freqs(n: usize, rate: f64, foi: (f64, f64)) -> Vec<f64> {
    let (lo, hi) = band_bins(n, rate, foi);
    (lo..=hi).map(|k| k as f64 * rate / n as f64).collect()
}

/// Power spectrum of one signal sampled at `rate`, restricted to `foi`.
pub fn power_spectrum(x: &[f64], rate: f64, foi: (f64, f64)) -> Result<Spectrum> {
    let n = x.len();
    check_inputs(n, rate, foi)?;
    let (lo, hi) = band_bins(n, rate, foi);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let taper = unit_taper(n);
    let power = tapered_power(x, &taper, fft.as_ref())[lo..=hi].to_vec();

    Ok(Spectrum { power, freqs: band_freqs(n, rate, foi) })
}

/// Average power spectrum over the rows of `signals` ([obs, T]).
///
/// A single row or a single column is one observation.
pub fn power_spectrum_rows(
    signals: ArrayView2<'_, f64>,
    rate: f64,
    foi: (f64, f64),
) -> Result<Spectrum> {
    if signals.nrows() == 1 || signals.ncols() == 1 {
        let x: Vec<f64> = signals.iter().copied().collect();
        return power_spectrum(&x, rate, foi);
    }

    let (n_obs, n) = signals.dim();
    check_inputs(n, rate, foi)?;
    let (lo, hi) = band_bins(n, rate, foi);

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let taper = unit_taper(n);
    let mut acc = vec![0.0_f64; hi - lo + 1];
    for row in signals.rows() {
        let x: Vec<f64> = row.to_vec();
        let p = tapered_power(&x, &taper, fft.as_ref());
        for (a, v) in acc.iter_mut().zip(&p[lo..=hi]) {
            *a += v;
        }
    }
    acc.iter_mut().for_each(|v| *v /= n_obs as f64);

    Ok(Spectrum { power: acc, freqs: band_freqs(n, rate, foi) })
}

/// Indices of strict local maxima, end points excluded.
///
/// A plateau counts once, at its first sample, when both sides fall off.
pub fn find_peaks(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut peaks = vec![];
    let mut i = 1;
    while i + 1 < n {
        if x[i] > x[i - 1] {
            let mut j = i;
            while j + 1 < n && x[j + 1] == x[i] {
                j += 1;
            }
            if j + 1 < n && x[j + 1] < x[i] {
                peaks.push(i);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn check_inputs(n: usize, rate: f64, (f_lo, f_hi): (f64, f64)) -> Result<()> {
    if n < 2 {
        return Err(BrainTimeError::shape("spectral input length", ">= 2", n));
    }
    if !(rate > 0.0 && rate.is_finite()) {
        return Err(BrainTimeError::config("rate", format!("must be > 0, got {rate}")));
    }
    if !(f_lo >= 0.0 && f_hi >= f_lo) {
        return Err(BrainTimeError::config("foi", format!("need 0 <= lo <= hi, got [{f_lo}, {f_hi}]")));
    }
    Ok(())
}

fn unit_taper(n: usize) -> Vec<f64> {
    let w = hanning(n);
    let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
    w.into_iter().map(|v| v / norm).collect()
}

/// One-sided power of the demeaned, tapered signal: bins `0..=n/2`.
fn tapered_power(x: &[f64], taper: &[f64], fft: &dyn rustfft::Fft<f64>) -> Vec<f64> {
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .zip(taper)
        .map(|(&v, &w)| Complex { re: (v - mean) * w, im: 0.0 })
        .collect();
    fft.process(&mut buf);

    let nyq = n / 2;
    (0..=nyq)
        .map(|k| {
            let p = buf[k].norm_sqr();
            if k == 0 || (n % 2 == 0 && k == nyq) { p } else { 2.0 * p }
        })
        .collect()
}
