//! Backtest results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::Prediction;
use crate::metrics::{AccuracyEstimator, PerformanceMetrics};
use crate::transform::TransformKind;

/// Outcome of one training window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWindowResult {
    pub window_index: usize,
    /// First timestamp of the training slice.
    pub first_used_index: NaiveDate,
    /// Number of training points.
    pub training_length: usize,
    /// Untransformed prediction from the first training timestamp through
    /// the forecast horizon.
    pub prediction: Prediction,
    /// Scores against the held-out test values.
    pub testing_performance: PerformanceMetrics,
}

/// What was backtested, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCharacteristics {
    pub name: String,
    pub test_values: usize,
    pub delta_training_values: usize,
    pub prediction_lags: usize,
    pub transformation: TransformKind,
    pub main_accuracy_estimator: AccuracyEstimator,
    /// Extra regressor columns handed to the model, if any.
    pub extra_regressors: Vec<String>,
}

/// All surviving windows of one model on one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub series: String,
    /// Sorted best first by the main accuracy estimator.
    pub results: Vec<TrainingWindowResult>,
    pub characteristics: ModelCharacteristics,
    /// Forecast from the best window's start through the horizon.
    pub best_prediction: Prediction,
}

impl ModelResult {
    /// The best-ranked window.
    pub fn best(&self) -> Option<&TrainingWindowResult> {
        self.results.first()
    }

    /// Ranking value of the best window.
    pub fn best_score(&self) -> Option<f64> {
        self.best()
            .map(|r| self.characteristics.main_accuracy_estimator.value(&r.testing_performance))
    }

    /// Window performances ordered by how far back training started, most
    /// recent first.
    pub fn performance_by_start(&self) -> Vec<&PerformanceMetrics> {
        let mut metrics: Vec<&PerformanceMetrics> =
            self.results.iter().map(|r| &r.testing_performance).collect();
        metrics.sort_by(|a, b| b.first_used_index.cmp(&a.first_used_index));
        metrics
    }

    /// The best prediction restricted to timestamps after `date`.
    pub fn forecast_after(&self, date: NaiveDate) -> Prediction {
        self.best_prediction.after(date)
    }

    pub fn summary(&self) -> String {
        let c = &self.characteristics;
        let mut out = format!(
            "Backtest '{}' on '{}'\n\
             ----------------------------------------\n\
             Windows: {} (test {}, delta {})\n\
             Transformation: {}\n\
             Horizon: {}\n\
             Ranked by: {}\n",
            c.name,
            self.series,
            self.results.len(),
            c.test_values,
            c.delta_training_values,
            c.transformation,
            c.prediction_lags,
            c.main_accuracy_estimator,
        );

        if !c.extra_regressors.is_empty() {
            out.push_str(&format!("Extra regressors: {}\n", c.extra_regressors.join(", ")));
        }

        out.push_str(&format!(
            "\n{:>6} {:>12} {:>8} {:>12} {:>12} {:>12} {:>12}\n",
            "window", "start", "length", "mae", "mse", "rmse", "am"
        ));
        for r in &self.results {
            let m = &r.testing_performance;
            out.push_str(&format!(
                "{:>6} {:>12} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
                r.window_index, r.first_used_index, r.training_length, m.mae, m.mse, m.rmse, m.am
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn window(index: usize, start: u32, mae: f64) -> TrainingWindowResult {
        TrainingWindowResult {
            window_index: index,
            first_used_index: date(start),
            training_length: (20 - start) as usize,
            prediction: Prediction::point(vec![date(start)], vec![1.0]),
            testing_performance: PerformanceMetrics {
                first_used_index: date(start),
                mae,
                mse: mae * mae,
                rmse: mae,
                am: -mae,
                points: 3,
            },
        }
    }

    fn sample() -> ModelResult {
        ModelResult {
            series: "sales".to_string(),
            results: vec![window(1, 5, 0.5), window(0, 10, 0.8)],
            characteristics: ModelCharacteristics {
                name: "naive".to_string(),
                test_values: 3,
                delta_training_values: 5,
                prediction_lags: 2,
                transformation: TransformKind::None,
                main_accuracy_estimator: AccuracyEstimator::Mae,
                extra_regressors: vec!["temperature".to_string()],
            },
            best_prediction: Prediction::point(vec![date(5), date(6)], vec![1.0, 2.0]),
        }
    }

    #[test]
    fn test_best() {
        let result = sample();
        assert_eq!(result.best().map(|r| r.window_index), Some(1));
        assert_eq!(result.best_score(), Some(0.5));
    }

    #[test]
    fn test_performance_by_start() {
        let result = sample();
        let starts: Vec<NaiveDate> = result
            .performance_by_start()
            .iter()
            .map(|m| m.first_used_index)
            .collect();
        assert_eq!(starts, vec![date(10), date(5)]);
    }

    #[test]
    fn test_forecast_after() {
        let result = sample();
        let tail = result.forecast_after(date(5));
        assert_eq!(tail.index, vec![date(6)]);
    }

    #[test]
    fn test_summary_lists_windows() {
        let summary = sample().summary();
        assert!(summary.contains("naive"));
        assert!(summary.contains("temperature"));
        assert!(summary.contains("2021-03-05"));
        assert!(summary.contains("0.8000"));
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample();
        let json = serde_json::to_string(&result).unwrap();
        let back: ModelResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
