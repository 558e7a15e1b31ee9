//! Autocorrelation with normal-approximation confidence bands.
//!
//! r(h) = Σ (x[t] - m)(x[t+h] - m) / n / c0, with c0 the population variance,
//! for h = 1..=n. Bands sit at ±z/√n for the 95% and 99% two-sided levels.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Autocorrelation curve of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autocorrelation {
    pub lags: Vec<usize>,
    pub values: Vec<f64>,
    /// z95 / sqrt(n)
    pub band_95: f64,
    /// z99 / sqrt(n)
    pub band_99: f64,
}

impl Autocorrelation {
    /// Lags whose autocorrelation lies outside the 95% band.
    pub fn significant_lags(&self) -> Vec<usize> {
        self.lags
            .iter()
            .zip(self.values.iter())
            .filter(|(_, v)| v.abs() > self.band_95)
            .map(|(lag, _)| *lag)
            .collect()
    }
}

/// Two-sided standard normal quantile for a confidence level.
fn z_score(confidence: f64) -> f64 {
    Normal::new(0.0, 1.0)
        .map(|n| n.inverse_cdf(0.5 + confidence / 2.0))
        .unwrap_or(f64::NAN)
}

/// Autocorrelation of `values`, NaN gaps excluded.
pub fn autocorrelation(values: &[f64]) -> Autocorrelation {
    let data: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = data.len();

    if n == 0 {
        return Autocorrelation {
            lags: vec![],
            values: vec![],
            band_95: f64::NAN,
            band_99: f64::NAN,
        };
    }

    let nf = n as f64;
    let mean = data.iter().sum::<f64>() / nf;
    let c0 = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / nf;

    let r = |h: usize| -> f64 {
        if c0 == 0.0 {
            return f64::NAN;
        }
        data[..n - h]
            .iter()
            .zip(data[h..].iter())
            .map(|(a, b)| (a - mean) * (b - mean))
            .sum::<f64>()
            / nf
            / c0
    };

    let lags: Vec<usize> = (1..=n).collect();
    let acf = lags.iter().map(|&h| r(h)).collect();

    Autocorrelation {
        lags,
        values: acf,
        band_95: z_score(0.95) / nf.sqrt(),
        band_99: z_score(0.99) / nf.sqrt(),
    }
}
