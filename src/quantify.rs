//! Recurrence quantification of a time-generalization matrix (TGM).
//!
//! ```text
//! TGM [n, n] ─► autocorr2d ─► AC map [n, n]
//!                               ├─ spectrum of every row    → dominant peak
//!                               └─ spectrum of every column → dominant peak
//! ```
//!
//! Frequencies are in Hz for [`RefDimension::ClockTime`] and in recurrences
//! per carrier cycle for [`RefDimension::BrainTime`].
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

use crate::autocorr::autocorr2d;
use crate::config::{QuantifyConfig, RefDimension};
use crate::error::{BrainTimeError, Result};
use crate::normalize::zscore_global_inplace;
use crate::report::{NullReporter, Reporter};
use crate::spectral::{power_spectrum, power_spectrum_rows, SpectralPeak, Spectrum};

/// AC map of a TGM and its spectral summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantification {
    /// Autocorrelation map, same shape as the TGM, zero lag at `(n/2, n/2)`.
    pub ac_map: Array2<f64>,
    pub ref_dimension: RefDimension,
    /// Dominant peak of each AC-map row.
    pub row_peaks: Vec<SpectralPeak>,
    /// Dominant peak of each AC-map column.
    pub col_peaks: Vec<SpectralPeak>,
    /// Spectrum averaged over all rows and all columns.
    pub mean_spectrum: Spectrum,
}

impl Quantification {
    /// Row peaks followed by column peaks.
    pub fn peaks(&self) -> impl Iterator<Item = &SpectralPeak> {
        self.row_peaks.iter().chain(&self.col_peaks)
    }

    pub fn peak_amplitudes(&self) -> Vec<f64> {
        self.peaks().map(|p| p.amplitude).collect()
    }

    pub fn peak_freqs(&self) -> Vec<f64> {
        self.peaks().map(|p| p.freq).collect()
    }

    /// Frequency axis of `mean_spectrum`.
    pub fn freqs(&self) -> &[f64] {
        &self.mean_spectrum.freqs
    }

    /// Strongest peak of the averaged spectrum.
    pub fn dominant(&self) -> Option<SpectralPeak> {
        self.mean_spectrum.dominant_peak()
    }

    /// Z-scored copy of the AC map for display.
    pub fn display_map(&self) -> Array2<f64> {
        let mut map = self.ac_map.clone();
        zscore_global_inplace(&mut map);
        map
    }
}

/// Quantify recurrence in a square TGM.
pub fn quantify_tgm(tgm: ArrayView2<'_, f64>, cfg: &QuantifyConfig) -> Result<Quantification> {
    quantify_tgm_with_reporter(tgm, cfg, &NullReporter)
}

/// [`quantify_tgm`], handing the result to `reporter` when `cfg.figure` is on.
pub fn quantify_tgm_with_reporter(
    tgm: ArrayView2<'_, f64>,
    cfg: &QuantifyConfig,
    reporter: &dyn Reporter,
) -> Result<Quantification> {
    let (n, m) = tgm.dim();
    if n != m {
        return Err(BrainTimeError::shape("TGM (must be square)", (n, n), (n, m)));
    }
    let rc = cfg.resolve(n)?;

    let ac_map = autocorr2d(tgm);
    let row_peaks = axis_peaks(&ac_map, Axis(0), rc.rate, rc.foi)?;
    let col_peaks = axis_peaks(&ac_map, Axis(1), rc.rate, rc.foi)?;
    let mean_spectrum = mean_axis_spectrum(ac_map.view(), rc.rate, rc.foi)?;
    debug!(
        side = n,
        rate = rc.rate,
        foi = ?rc.foi,
        dimension = rc.ref_dimension.name(),
        "TGM quantified"
    );

    let quant = Quantification {
        ac_map,
        ref_dimension: rc.ref_dimension,
        row_peaks,
        col_peaks,
        mean_spectrum,
    };
    if rc.figure {
        reporter.recurrence(&quant);
    }
    Ok(quant)
}

/// Spectrum of an AC map averaged over all of its rows and all of its columns.
///
/// Both averages share one frequency axis because the map is square.
pub fn mean_axis_spectrum(
    ac_map: ArrayView2<'_, f64>,
    rate: f64,
    foi: (f64, f64),
) -> Result<Spectrum> {
    let rows = power_spectrum_rows(ac_map, rate, foi)?;
    let cols = power_spectrum_rows(ac_map.t(), rate, foi)?;
    let power = rows
        .power
        .iter()
        .zip(&cols.power)
        .map(|(r, c)| 0.5 * (r + c))
        .collect();
    Ok(Spectrum { power, freqs: rows.freqs })
}

/// Dominant peak of every lane along `axis` (`Axis(0)`: rows).
fn axis_peaks(
    ac_map: &Array2<f64>,
    axis: Axis,
    rate: f64,
    foi: (f64, f64),
) -> Result<Vec<SpectralPeak>> {
    let (lanes, name) = match axis {
        Axis(0) => (ac_map.rows().into_iter().collect::<Vec<_>>(), "row"),
        _ => (ac_map.columns().into_iter().collect::<Vec<_>>(), "column"),
    };
    lanes
        .into_iter()
        .enumerate()
        .map(|(index, lane)| lane_peak(lane, rate, foi, name, index))
        .collect()
}

fn lane_peak(
    lane: ArrayView1<'_, f64>,
    rate: f64,
    foi: (f64, f64),
    axis: &'static str,
    index: usize,
) -> Result<SpectralPeak> {
    let x = lane.to_vec();
    power_spectrum(&x, rate, foi)?
        .dominant_peak()
        .ok_or(BrainTimeError::NoSpectralPeak { axis, index, f_lo: foi.0, f_hi: foi.1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn non_square_rejected() {
        let tgm = Array2::zeros((8, 9));
        assert!(matches!(
            quantify_tgm(tgm.view(), &QuantifyConfig::default()),
            Err(BrainTimeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_recurrence_has_no_peak() {
        let tgm = Array2::zeros((16, 16));
        assert!(matches!(
            quantify_tgm(tgm.view(), &QuantifyConfig::default()),
            Err(BrainTimeError::NoSpectralPeak { axis: "row", index: 0, .. })
        ));
    }

    #[test]
    fn peaks_concatenate_rows_then_columns() {
        let n = 64;
        let tgm = Array2::from_shape_fn((n, n), |(i, j)| {
            (2.0 * PI * 8.0 * i as f64 / 64.0).cos() * (2.0 * PI * 8.0 * j as f64 / 64.0).cos()
        });
        let cfg = QuantifyConfig { sample_rate: 64.0, foi: Some((2.0, 20.0)), ..Default::default() };
        let q = quantify_tgm(tgm.view(), &cfg).unwrap();
        assert_eq!(q.peaks().count(), 2 * n);
        assert_eq!(q.peak_freqs()[..n], q.row_peaks.iter().map(|p| p.freq).collect::<Vec<_>>()[..]);
        assert!(q.peaks().all(|p| (p.freq - 8.0).abs() <= 1.0));
        let dom = q.dominant().unwrap();
        assert!((dom.freq - 8.0).abs() <= 1.0, "dominant at {}", dom.freq);
    }
}
