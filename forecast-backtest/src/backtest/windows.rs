//! Training window generation.
//!
//! The last `test_values` points are held out. Training windows all end
//! right before the test slice and grow backwards by `delta_training_values`
//! points each, the oldest one being cut at the start of the series.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{ConfigError, ModelParameters};

/// One training window, as positions into the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingWindow {
    /// Window number, 0 being the shortest.
    pub window_index: usize,
    /// First training position.
    pub start: usize,
    /// One past the last training position.
    pub end: usize,
}

impl TrainingWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Resolved window sizes and the windows they produce for one series length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPlan {
    pub series_len: usize,
    pub test_values: usize,
    pub delta_training_values: usize,
    pub windows: Vec<TrainingWindow>,
}

impl WindowPlan {
    /// Resolve `params` against a series of `series_len` points.
    ///
    /// Absolute sizes win over percentages. Percentages are floored with a
    /// minimum of one point, and a percentage-derived delta larger than the
    /// history before the test slice is clipped to it.
    pub fn resolve(series_len: usize, params: &ModelParameters) -> Result<Self, ConfigError> {
        params.validate()?;

        let test_values = match (params.test_values, params.test_percentage) {
            (Some(values), _) => values,
            (None, Some(pct)) => percent_of(series_len, pct),
            (None, None) => missing_size("test")?,
        };

        if test_values >= series_len {
            return Err(ConfigError::InsufficientData {
                series_len,
                required: test_values + 1,
            });
        }
        let history = series_len - test_values;

        let delta_training_values = match (
            params.delta_training_values,
            params.delta_training_percentage,
        ) {
            (Some(values), _) => values,
            (None, Some(pct)) => {
                let delta = percent_of(series_len, pct);
                if delta > history {
                    debug!(delta, history, "Clipping delta_training_values to history");
                    history
                } else {
                    delta
                }
            }
            (None, None) => missing_size("delta_training")?,
        };

        if series_len < delta_training_values + test_values {
            return Err(ConfigError::InsufficientData {
                series_len,
                required: delta_training_values + test_values,
            });
        }

        let count = history.div_ceil(delta_training_values);
        let windows = (0..count)
            .map(|i| TrainingWindow {
                window_index: i,
                start: history.saturating_sub((i + 1) * delta_training_values),
                end: history,
            })
            .collect();

        Ok(Self {
            series_len,
            test_values,
            delta_training_values,
            windows,
        })
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Positions of the held-out test values.
    pub fn test_range(&self) -> Range<usize> {
        (self.series_len - self.test_values)..self.series_len
    }
}

fn percent_of(len: usize, pct: f64) -> usize {
    // Tolerance keeps exact products such as 70 * 10% from flooring to 6
    (((len as f64) * pct / 100.0 + 1e-9).floor() as usize).max(1)
}

fn missing_size(what: &str) -> Result<usize, ConfigError> {
    Err(ConfigError::InvalidParameter(format!(
        "either {0}_values or {0}_percentage is required",
        what
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_percentages() {
        let plan = WindowPlan::resolve(100, &ModelParameters::default()).unwrap();
        assert_eq!(plan.test_values, 10);
        assert_eq!(plan.delta_training_values, 20);
        assert_eq!(plan.window_count(), 5);
        assert_eq!(plan.test_range(), 90..100);

        let starts: Vec<usize> = plan.windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![70, 50, 30, 10, 0]);
        assert!(plan.windows.iter().all(|w| w.end == 90));
    }

    #[test]
    fn test_absolute_test_values() {
        let params = ModelParameters::default().with_test_values(5);
        let plan = WindowPlan::resolve(100, &params).unwrap();
        assert_eq!(plan.test_values, 5);
        assert_eq!(plan.window_count(), 5);
        assert_eq!(plan.windows[4].start, 0);
        assert_eq!(plan.windows[4].len(), 95);
    }

    #[test]
    fn test_evenly_divided_history_has_no_duplicate_window() {
        // 80 points of history split exactly into four deltas of 20
        let params = ModelParameters::default()
            .with_test_values(10)
            .with_delta_training_values(20);
        let plan = WindowPlan::resolve(90, &params).unwrap();
        assert_eq!(plan.window_count(), 4);

        let starts: Vec<usize> = plan.windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![60, 40, 20, 0]);
        assert_eq!(plan.windows[3].len(), 80);
    }

    #[test]
    fn test_absolute_wins_over_percentage() {
        let params = ModelParameters {
            test_values: Some(7),
            test_percentage: Some(50.0),
            delta_training_values: Some(30),
            ..Default::default()
        };
        let plan = WindowPlan::resolve(100, &params).unwrap();
        assert_eq!(plan.test_values, 7);
        assert_eq!(plan.delta_training_values, 30);
        assert_eq!(plan.window_count(), 4);
    }

    #[test]
    fn test_percentage_minimum_one() {
        let params = ModelParameters {
            test_percentage: Some(1.0),
            delta_training_percentage: Some(1.0),
            ..Default::default()
        };
        let plan = WindowPlan::resolve(20, &params).unwrap();
        assert_eq!(plan.test_values, 1);
        assert_eq!(plan.delta_training_values, 1);
        assert_eq!(plan.window_count(), 19);
    }

    #[test]
    fn test_percentage_delta_clipped() {
        let params = ModelParameters {
            test_percentage: Some(50.0),
            delta_training_percentage: Some(80.0),
            ..Default::default()
        };
        let plan = WindowPlan::resolve(10, &params).unwrap();
        assert_eq!(plan.test_values, 5);
        assert_eq!(plan.delta_training_values, 5);
        assert_eq!(plan.window_count(), 1);
    }

    #[test]
    fn test_absolute_delta_too_large() {
        let params = ModelParameters::default()
            .with_test_values(5)
            .with_delta_training_values(20);
        let err = WindowPlan::resolve(20, &params).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InsufficientData { series_len: 20, required: 25 }
        ));
    }

    #[test]
    fn test_test_slice_consumes_series() {
        let params = ModelParameters::default().with_test_values(10);
        assert!(WindowPlan::resolve(10, &params).is_err());
    }

    #[test]
    fn test_window_invariants_over_lengths() {
        for len in 2..200 {
            for (test_pct, delta_pct) in [(10.0, 20.0), (5.0, 7.5), (33.0, 50.0), (1.0, 100.0)] {
                let params = ModelParameters {
                    test_percentage: Some(test_pct),
                    delta_training_percentage: Some(delta_pct),
                    ..Default::default()
                };
                let plan = match WindowPlan::resolve(len, &params) {
                    Ok(plan) => plan,
                    Err(_) => continue,
                };
                let history = len - plan.test_values;

                assert_eq!(
                    plan.window_count(),
                    history.div_ceil(plan.delta_training_values),
                    "len {} pct {}/{}",
                    len,
                    test_pct,
                    delta_pct
                );
                for (i, w) in plan.windows.iter().enumerate() {
                    assert_eq!(w.window_index, i);
                    assert_eq!(w.end, history);
                    assert!(!w.is_empty());
                    if i > 0 {
                        assert!(w.start < plan.windows[i - 1].start);
                    }
                }
                assert_eq!(plan.windows.last().map(|w| w.start), Some(0));
            }
        }
    }
}
