//! Forecast accuracy scoring.
//!
//! Compares a prediction with the actual values on the timestamps both share.
//! Nothing is interpolated: timestamps present on only one side, and pairs
//! where either side is a NaN gap, do not count.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Series;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("No overlapping timestamps between '{actual}' and '{predicted}'")]
    MisalignedSeries { actual: String, predicted: String },
}

/// Error statistics of one prediction against the actual values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// First timestamp of the training data behind the prediction.
    pub first_used_index: NaiveDate,
    /// Mean absolute error.
    pub mae: f64,
    /// Mean squared error.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Arithmetic mean of the signed errors (predicted - actual).
    pub am: f64,
    /// Number of compared points.
    pub points: usize,
}

impl PerformanceMetrics {
    pub fn summary(&self) -> String {
        format!(
            "from {}: MAE {:.4}, MSE {:.4}, RMSE {:.4}, AM {:.4} ({} points)",
            self.first_used_index, self.mae, self.mse, self.rmse, self.am, self.points
        )
    }
}

/// Metric used to rank training windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyEstimator {
    #[default]
    Mae,
    Mse,
    Rmse,
    Am,
}

impl AccuracyEstimator {
    /// The ranking value of this estimator; lower is better.
    pub fn value(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Mae => metrics.mae,
            Self::Mse => metrics.mse,
            Self::Rmse => metrics.rmse,
            Self::Am => metrics.am,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Rmse => "rmse",
            Self::Am => "am",
        }
    }
}

impl fmt::Display for AccuracyEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccuracyEstimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mae" => Ok(Self::Mae),
            "mse" => Ok(Self::Mse),
            "rmse" => Ok(Self::Rmse),
            "am" => Ok(Self::Am),
            other => Err(format!("Unknown accuracy estimator: {}", other)),
        }
    }
}

/// Scorer for aligned actual/predicted series.
pub struct PerformanceScorer;

impl PerformanceScorer {
    /// Score `predicted` against `actual` on their common timestamps.
    pub fn score(
        actual: &Series,
        predicted: &Series,
        first_used_index: NaiveDate,
    ) -> Result<PerformanceMetrics, ScoreError> {
        let errors = Self::aligned_errors(actual, predicted);

        if errors.is_empty() {
            return Err(ScoreError::MisalignedSeries {
                actual: actual.name().to_string(),
                predicted: predicted.name().to_string(),
            });
        }

        let n = errors.len() as f64;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let am = errors.iter().sum::<f64>() / n;

        Ok(PerformanceMetrics {
            first_used_index,
            mae,
            mse,
            rmse: mse.sqrt(),
            am,
            points: errors.len(),
        })
    }

    /// Signed errors `predicted - actual` on the timestamp intersection.
    fn aligned_errors(actual: &Series, predicted: &Series) -> Vec<f64> {
        let a_idx = actual.index();
        let p_idx = predicted.index();
        let a_val = actual.values();
        let p_val = predicted.values();

        // Merge walk; both indexes are strictly increasing
        let mut errors = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a_idx.len() && j < p_idx.len() {
            match a_idx[i].cmp(&p_idx[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let (a, p) = (a_val[i], p_val[j]);
                    if !a.is_nan() && !p.is_nan() {
                        errors.push(p - a);
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(start: u32, n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2020, 1, start + i as u32).unwrap())
            .collect()
    }

    #[test]
    fn test_basic_metrics() {
        let actual = Series::new("a", dates(1, 4), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let predicted = Series::new("p", dates(1, 4), vec![2.0, 2.0, 1.0, 5.0]).unwrap();
        let m = PerformanceScorer::score(&actual, &predicted, dates(1, 1)[0]).unwrap();

        // errors: 1, 0, -2, 1
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.mse - 1.5).abs() < 1e-12);
        assert!((m.rmse - 1.5f64.sqrt()).abs() < 1e-12);
        assert!((m.am - 0.0).abs() < 1e-12);
        assert_eq!(m.points, 4);
    }

    #[test]
    fn test_am_keeps_sign() {
        let actual = Series::new("a", dates(1, 3), vec![1.0, 1.0, 1.0]).unwrap();
        let predicted = Series::new("p", dates(1, 3), vec![0.0, 0.5, 0.5]).unwrap();
        let m = PerformanceScorer::score(&actual, &predicted, dates(1, 1)[0]).unwrap();
        assert!(m.am < 0.0);
        assert!((m.am + 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_scores_only_intersection() {
        let actual = Series::new("a", dates(1, 5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let predicted = Series::new("p", dates(4, 5), vec![4.0, 6.0, 0.0, 0.0, 0.0]).unwrap();
        let m = PerformanceScorer::score(&actual, &predicted, dates(1, 1)[0]).unwrap();
        assert_eq!(m.points, 2);
        assert!((m.mae - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_nan_gaps_not_scored() {
        let actual = Series::new("a", dates(1, 3), vec![1.0, f64::NAN, 3.0]).unwrap();
        let predicted = Series::new("p", dates(1, 3), vec![2.0, 2.0, 4.0]).unwrap();
        let m = PerformanceScorer::score(&actual, &predicted, dates(1, 1)[0]).unwrap();
        assert_eq!(m.points, 2);
        assert!((m.mae - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_misaligned() {
        let actual = Series::new("a", dates(1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let predicted = Series::new("p", dates(10, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let err = PerformanceScorer::score(&actual, &predicted, dates(1, 1)[0]).unwrap_err();
        assert!(matches!(err, ScoreError::MisalignedSeries { .. }));
    }

    #[test]
    fn test_estimator_value() {
        let m = PerformanceMetrics {
            first_used_index: dates(1, 1)[0],
            mae: 1.0,
            mse: 2.0,
            rmse: 3.0,
            am: -4.0,
            points: 1,
        };
        assert_eq!(AccuracyEstimator::Mae.value(&m), 1.0);
        assert_eq!(AccuracyEstimator::Mse.value(&m), 2.0);
        assert_eq!(AccuracyEstimator::Rmse.value(&m), 3.0);
        assert_eq!(AccuracyEstimator::Am.value(&m), -4.0);
        assert_eq!("RMSE".parse::<AccuracyEstimator>().unwrap(), AccuracyEstimator::Rmse);
        assert!("mape".parse::<AccuracyEstimator>().is_err());
    }
}
