use braintime::autocorr::autocorr2d;
use braintime::spectral::{band_bins, power_spectrum, power_spectrum_rows};
use ndarray::Array2;
use std::f64::consts::PI;

fn sine(freq: f64, rate: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| (2.0 * PI * freq * i as f64 / rate).sin()).collect()
}

#[test]
fn bins_lie_in_band_and_count_matches_resolution() {
    for &(n, rate, lo, hi) in &[
        (128usize, 128.0, 1.0, 30.0),
        (100, 50.0, 2.2, 7.9),
        (257, 64.0, 0.3, 31.9),
        (64, 16.0, 0.25, 4.0),
    ] {
        let x = sine(3.0, rate, n);
        let s = power_spectrum(&x, rate, (lo, hi)).unwrap();
        let res = rate / n as f64;
        let (b0, b1) = band_bins(n, rate, (lo, hi));
        assert_eq!(s.len(), b1 - b0 + 1, "n={n} rate={rate}");
        for &f in &s.freqs {
            assert!(f >= lo - res / 2.0 && f <= hi + res / 2.0, "{f} outside [{lo}, {hi}]");
        }
        for w in s.freqs.windows(2) {
            approx::assert_abs_diff_eq!(w[1] - w[0], res, epsilon = 1e-12);
        }
    }
}

#[test]
fn band_clamped_to_nyquist() {
    let s = power_spectrum(&sine(5.0, 32.0, 64), 32.0, (1.0, 100.0)).unwrap();
    assert_eq!(s.freqs.last(), Some(&16.0));
}

#[test]
fn single_row_is_not_averaged() {
    let x = sine(7.0, 64.0, 128);
    let row = Array2::from_shape_vec((1, 128), x.clone()).unwrap();
    assert_eq!(
        power_spectrum_rows(row.view(), 64.0, (1.0, 20.0)).unwrap(),
        power_spectrum(&x, 64.0, (1.0, 20.0)).unwrap()
    );
}

#[test]
fn autocorr_of_periodic_tgm_recurs() {
    let tgm = Array2::from_shape_fn((40, 40), |(i, j)| (2.0 * PI * (i as f64 - j as f64) / 10.0).cos());
    let ac = autocorr2d(tgm.view());
    // Diagonal stripes: shifting both axes together keeps the pattern.
    assert!(ac[[30, 30]] > 0.4);
    assert!(ac[[20, 25]] < -0.4);
}

#[test]
fn invalid_inputs_rejected() {
    assert!(power_spectrum(&[1.0], 10.0, (0.0, 5.0)).is_err());
    assert!(power_spectrum(&[1.0, 2.0, 3.0], 0.0, (0.0, 5.0)).is_err());
    assert!(power_spectrum(&[1.0, 2.0, 3.0], 10.0, (4.0, 2.0)).is_err());
}
