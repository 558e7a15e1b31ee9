//! Lag-indexed cross-correlation between a target column and every other
//! column of a frame.
//!
//! For lag `k` the target at position `n` is paired with the other column at
//! position `n - k`. A negative lag therefore pairs the target with later
//! values of the other column, a positive lag with earlier ones.
//!
//! The best lag of a curve is the one with the largest absolute correlation.
//! Values within [`TIE_TOLERANCE`] of the maximum are ties, resolved in favour
//! of the smallest |lag| (negative before positive).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{DataResult, TimeFrame};

use super::correlation::{correlate, CorrelationMode};

pub const TIE_TOLERANCE: f64 = 1e-9;

/// Cross-correlation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XcorrParameters {
    /// Largest lag (in both directions).
    pub xcorr_max_lags: usize,
    /// Modes to compute.
    pub xcorr_modes: Vec<CorrelationMode>,
    /// Mode used to pick extra regressors.
    pub xcorr_mode_target: CorrelationMode,
    /// Minimum |correlation| for a column to become an extra regressor.
    /// No regressors are selected when unset.
    pub xcorr_extra_regressor_threshold: Option<f64>,
}

impl Default for XcorrParameters {
    fn default() -> Self {
        Self {
            xcorr_max_lags: 120,
            xcorr_modes: CorrelationMode::ALL.to_vec(),
            xcorr_mode_target: CorrelationMode::Pearson,
            xcorr_extra_regressor_threshold: None,
        }
    }
}

/// Correlation of the target with one column over `[-max_lags, max_lags]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationCurve {
    pub column: String,
    pub lags: Vec<i64>,
    pub values: Vec<f64>,
}

impl CorrelationCurve {
    /// Correlation at a given lag.
    pub fn at(&self, lag: i64) -> Option<f64> {
        let max = (self.lags.len() / 2) as i64;
        if lag.abs() > max {
            return None;
        }
        self.values.get((lag + max) as usize).copied()
    }

    /// Lag with the largest |correlation|; `None` if every value is NaN.
    pub fn best_lag(&self) -> Option<CorrelationPeak> {
        let peak = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v.abs())
            .max_by(f64::total_cmp)?;

        // Scan outward from lag 0, negative side first
        let max = (self.lags.len() / 2) as i64;
        std::iter::once(0)
            .chain((1..=max).flat_map(|k| [-k, k]))
            .find_map(|lag| match self.at(lag) {
                Some(v) if !v.is_nan() && v.abs() >= peak - TIE_TOLERANCE => Some((lag, v)),
                _ => None,
            })
            .map(|(lag, correlation)| CorrelationPeak {
                column: self.column.clone(),
                lag,
                correlation,
            })
    }
}

/// Best lag of one column under one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPeak {
    pub column: String,
    pub lag: i64,
    pub correlation: f64,
}

/// Curves of every column under one mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeCurves {
    pub mode: CorrelationMode,
    pub curves: Vec<CorrelationCurve>,
}

/// Cross-correlation of a target against every other column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCorrelationResult {
    pub target: String,
    pub max_lags: usize,
    pub modes: Vec<ModeCurves>,
}

impl CrossCorrelationResult {
    pub fn curves(&self, mode: CorrelationMode) -> Option<&[CorrelationCurve]> {
        self.modes
            .iter()
            .find(|m| m.mode == mode)
            .map(|m| m.curves.as_slice())
    }

    pub fn curve(&self, mode: CorrelationMode, column: &str) -> Option<&CorrelationCurve> {
        self.curves(mode)?.iter().find(|c| c.column == column)
    }

    /// Best lag of a column under a mode.
    pub fn best_lag(&self, mode: CorrelationMode, column: &str) -> Option<i64> {
        self.curve(mode, column)?.best_lag().map(|p| p.lag)
    }

    /// Peaks of every column under a mode, in column order.
    pub fn peaks(&self, mode: CorrelationMode) -> Vec<CorrelationPeak> {
        self.curves(mode)
            .map(|curves| curves.iter().filter_map(|c| c.best_lag()).collect())
            .unwrap_or_default()
    }

    /// Peaks with |correlation| above `threshold`, per mode. These are the
    /// edges of the correlation graph between the target and other columns.
    pub fn edges(&self, threshold: f64) -> Vec<(CorrelationMode, CorrelationPeak)> {
        self.modes
            .iter()
            .flat_map(|m| {
                self.peaks(m.mode)
                    .into_iter()
                    .filter(|p| p.correlation.abs() > threshold)
                    .map(move |p| (m.mode, p))
            })
            .collect()
    }

    /// Columns whose peak under `mode` exceeds `threshold`, strongest first.
    pub fn select_extra_regressors(&self, mode: CorrelationMode, threshold: f64) -> Vec<String> {
        let mut peaks: Vec<CorrelationPeak> = self
            .peaks(mode)
            .into_iter()
            .filter(|p| p.correlation.abs() > threshold)
            .collect();
        peaks.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        peaks.into_iter().map(|p| p.column).collect()
    }

    /// Text table of the peaks.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Cross-correlation of '{}' (max lag {})\n",
            self.target, self.max_lags
        );
        for m in &self.modes {
            out.push_str(&format!("\n[{}]\n", m.mode));
            for peak in self.peaks(m.mode) {
                out.push_str(&format!(
                    "  {:<24} lag {:>5}  corr {:>7.3}\n",
                    peak.column, peak.lag, peak.correlation
                ));
            }
        }
        out
    }
}

/// Cross-correlation analyzer.
pub struct CrossCorrelationAnalyzer;

impl CrossCorrelationAnalyzer {
    /// Correlate `target` against every other column of `frame`.
    pub fn compute(
        target: &str,
        frame: &TimeFrame,
        max_lags: usize,
        modes: &[CorrelationMode],
    ) -> DataResult<CrossCorrelationResult> {
        let target_values = frame.values(target)?;
        let others: Vec<&str> = frame
            .column_names()
            .into_iter()
            .filter(|c| *c != target)
            .collect();

        let jobs: Vec<(CorrelationMode, &str)> = modes
            .iter()
            .flat_map(|m| others.iter().map(move |c| (*m, *c)))
            .collect();

        let curves: Vec<(CorrelationMode, CorrelationCurve)> = jobs
            .par_iter()
            .map(|(mode, column)| {
                let other = frame.values(column)?;
                Ok((*mode, Self::curve(*mode, column, target_values, other, max_lags)))
            })
            .collect::<DataResult<_>>()?;

        let modes = modes
            .iter()
            .map(|mode| ModeCurves {
                mode: *mode,
                curves: curves
                    .iter()
                    .filter(|(m, _)| m == mode)
                    .map(|(_, c)| c.clone())
                    .collect(),
            })
            .collect();

        debug!(
            "Cross-correlated '{}' against {} columns over {} lags",
            target,
            others.len(),
            2 * max_lags + 1
        );

        Ok(CrossCorrelationResult {
            target: target.to_string(),
            max_lags,
            modes,
        })
    }

    /// Correlation curve of one column.
    pub fn curve(
        mode: CorrelationMode,
        column: &str,
        target: &[f64],
        other: &[f64],
        max_lags: usize,
    ) -> CorrelationCurve {
        let max = max_lags as i64;
        let lags: Vec<i64> = (-max..=max).collect();
        let values = lags
            .iter()
            .map(|&lag| {
                let (x, y) = lagged_pairs(target, other, lag);
                if x.len() < 2 {
                    return f64::NAN;
                }
                correlate(mode, &x, &y)
            })
            .collect();

        CorrelationCurve {
            column: column.to_string(),
            lags,
            values,
        }
    }
}

/// Pairs `(target[n], other[n - lag])` for every valid `n`, skipping NaN gaps.
fn lagged_pairs(target: &[f64], other: &[f64], lag: i64) -> (Vec<f64>, Vec<f64>) {
    let len = target.len().min(other.len()) as i64;
    let start = lag.max(0);
    let end = (len + lag).min(len);

    let mut x = Vec::new();
    let mut y = Vec::new();
    for n in start..end {
        let a = target[n as usize];
        let b = other[(n - lag) as usize];
        if !a.is_nan() && !b.is_nan() {
            x.push(a);
            y.push(b);
        }
    }
    (x, y)
}
