//! Core backtesting engine.
//!
//! Runs one model over one series:
//! 1. Resolve the window plan from the series length
//! 2. Transform the series once
//! 3. Fit a fresh model per training window (in parallel)
//! 4. Predict from the window start through the forecast horizon
//! 5. Invert the transform and score against the held-out test values
//! 6. Rank the surviving windows by the main accuracy estimator
//! 7. Refit on the best window's data to produce the final forecast

use chrono::NaiveDate;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{DataError, Prediction, Series, TimeFrame};
use crate::metrics::{PerformanceScorer, ScoreError};

use super::config::{ConfigError, ModelParameters};
use super::model::{ForecastModel, ModelError, ModelFactory};
use super::result::{ModelCharacteristics, ModelResult, TrainingWindowResult};
use super::windows::{TrainingWindow, WindowPlan};

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Configuration error for '{series}': {source}")]
    Configuration {
        series: String,
        #[source]
        source: ConfigError,
    },

    #[error("Model failed on '{series}' window {window}: {source}")]
    ModelTraining {
        series: String,
        window: usize,
        #[source]
        source: ModelError,
    },

    #[error("Cannot score '{series}' window {window}: {source}")]
    MisalignedSeries {
        series: String,
        window: usize,
        #[source]
        source: ScoreError,
    },

    #[error("All {attempted} training windows failed for '{series}'")]
    AllWindowsFailed { series: String, attempted: usize },

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Backtests the models built by a factory.
pub struct BacktestEngine<F: ModelFactory> {
    factory: F,
    params: ModelParameters,
}

impl<F: ModelFactory> BacktestEngine<F> {
    pub fn new(factory: F, params: ModelParameters) -> Self {
        Self { factory, params }
    }

    /// Backtest `series`, optionally with extra regressors.
    ///
    /// The regressor frame must cover the series index and the forecast
    /// horizon for models that use it. Regressor values are passed through
    /// untransformed.
    pub fn run(
        &self,
        series: &Series,
        extra_regressors: Option<&TimeFrame>,
    ) -> Result<ModelResult, BacktestError> {
        let name = series.name();
        let plan = WindowPlan::resolve(series.len(), &self.params).map_err(|source| {
            BacktestError::Configuration {
                series: name.to_string(),
                source,
            }
        })?;

        let frequency = series.frequency()?;
        let last = series.index()[plan.series_len - 1];
        let horizon = frequency.future_index(last, self.params.prediction_lags);

        let transformed = self.params.transformation.apply_series(series);
        let actual = series.slice(plan.test_range());

        let mut final_model = self.factory.build();
        let model_name = final_model.name().to_string();

        info!(
            "Backtesting '{}' on '{}': {} windows, test {}, delta {}",
            model_name,
            name,
            plan.window_count(),
            plan.test_values,
            plan.delta_training_values
        );

        let outcomes: Vec<Result<TrainingWindowResult, BacktestError>> = plan
            .windows
            .par_iter()
            .map(|window| {
                let mut model = self.factory.build();
                self.run_window(
                    &mut model,
                    series,
                    &transformed,
                    &actual,
                    window,
                    &horizon,
                    extra_regressors,
                )
            })
            .collect();

        let attempted = outcomes.len();
        let mut results = Vec::with_capacity(attempted);
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => warn!("Skipping window: {}", e),
            }
        }

        if results.is_empty() {
            return Err(BacktestError::AllWindowsFailed {
                series: name.to_string(),
                attempted,
            });
        }

        // Stable: equal scores keep window order
        let estimator = self.params.main_accuracy_estimator;
        results.sort_by(|a, b| {
            estimator
                .value(&a.testing_performance)
                .total_cmp(&estimator.value(&b.testing_performance))
        });

        let best = &results[0];
        info!(
            "Best window for '{}' on '{}': {} (from {}, {} = {:.4})",
            model_name,
            name,
            best.window_index,
            best.first_used_index,
            estimator,
            estimator.value(&best.testing_performance)
        );

        let best_prediction = self.refit_best(
            &mut final_model,
            series,
            &transformed,
            best,
            &horizon,
            extra_regressors,
        );

        let characteristics = ModelCharacteristics {
            name: model_name,
            test_values: plan.test_values,
            delta_training_values: plan.delta_training_values,
            prediction_lags: self.params.prediction_lags,
            transformation: self.params.transformation,
            main_accuracy_estimator: estimator,
            extra_regressors: extra_regressors
                .map(|r| r.column_names().into_iter().map(String::from).collect())
                .unwrap_or_default(),
        };

        Ok(ModelResult {
            series: name.to_string(),
            results,
            characteristics,
            best_prediction,
        })
    }

    /// Backtest every column of `frame` independently.
    ///
    /// A failing column does not stop the others.
    pub fn run_frame(
        &self,
        frame: &TimeFrame,
    ) -> Vec<(String, Result<ModelResult, BacktestError>)> {
        frame
            .column_names()
            .into_iter()
            .map(|column| {
                let outcome = frame
                    .series(column)
                    .map_err(BacktestError::from)
                    .and_then(|series| self.run(&series, None));
                if let Err(e) = &outcome {
                    warn!("Backtest of '{}' failed: {}", column, e);
                }
                (column.to_string(), outcome)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn run_window(
        &self,
        model: &mut F::Model,
        series: &Series,
        transformed: &Series,
        actual: &Series,
        window: &TrainingWindow,
        horizon: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> Result<TrainingWindowResult, BacktestError> {
        let training = transformed.slice(window.range());
        let first_used_index = training.index()[0];

        let mut index = series.index()[window.start..].to_vec();
        index.extend_from_slice(horizon);

        let prediction = self
            .fit_predict(model, &training, &index, extra_regressors)
            .map_err(|source| BacktestError::ModelTraining {
                series: series.name().to_string(),
                window: window.window_index,
                source,
            })?;

        let yhat = prediction.yhat_series(series.name())?;
        let testing_performance = PerformanceScorer::score(actual, &yhat, first_used_index)
            .map_err(|source| BacktestError::MisalignedSeries {
                series: series.name().to_string(),
                window: window.window_index,
                source,
            })?;

        debug!(
            "Window {} of '{}' ({} points): {}",
            window.window_index,
            series.name(),
            window.len(),
            testing_performance.summary()
        );

        Ok(TrainingWindowResult {
            window_index: window.window_index,
            first_used_index,
            training_length: window.len(),
            prediction,
            testing_performance,
        })
    }

    /// Train on the best window's start through the end of the data and
    /// forecast the horizon. Falls back to the window's own prediction.
    fn refit_best(
        &self,
        model: &mut F::Model,
        series: &Series,
        transformed: &Series,
        best: &TrainingWindowResult,
        horizon: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> Prediction {
        let training = transformed.since(best.first_used_index);
        let mut index = training.index().to_vec();
        index.extend_from_slice(horizon);

        match self.fit_predict(model, &training, &index, extra_regressors) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(
                    "Refit of '{}' from {} failed, keeping window {} prediction: {}",
                    series.name(),
                    best.first_used_index,
                    best.window_index,
                    e
                );
                best.prediction.clone()
            }
        }
    }

    /// Train, predict over `index` and undo the transform.
    fn fit_predict(
        &self,
        model: &mut F::Model,
        training: &Series,
        index: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> Result<Prediction, ModelError> {
        let training_regressors = extra_regressors.map(|r| r.rows_at(training.index()));
        model.train(training, training_regressors.as_ref())?;

        let prediction_regressors = extra_regressors.map(|r| r.rows_at(index));
        let prediction = model.predict(index, prediction_regressors.as_ref())?;

        if prediction.index != index || !prediction.is_consistent() {
            return Err(ModelError::Predict(format!(
                "expected {} rows, got {}",
                index.len(),
                prediction.len()
            )));
        }

        Ok(self.params.transformation.invert_prediction(prediction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::model::FitResult;
    use crate::metrics::AccuracyEstimator;
    use crate::transform::TransformKind;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
    }

    fn linear(n: usize) -> Series {
        Series::new("linear", dates(n), (1..=n).map(|v| v as f64).collect()).unwrap()
    }

    fn plain() -> ModelParameters {
        ModelParameters::default().with_transformation(TransformKind::None)
    }

    /// Repeats the last training value.
    #[derive(Default)]
    struct LastValue {
        last: Option<f64>,
    }

    impl ForecastModel for LastValue {
        fn name(&self) -> &str {
            "last_value"
        }

        fn train(&mut self, training: &Series, _: Option<&TimeFrame>) -> FitResult<()> {
            self.last = training.values().last().copied();
            Ok(())
        }

        fn predict(&self, index: &[NaiveDate], _: Option<&TimeFrame>) -> FitResult<Prediction> {
            let last = self.last.ok_or(ModelError::NotTrained)?;
            Ok(Prediction::point(index.to_vec(), vec![last; index.len()]))
        }
    }

    /// Predicts the training mean, refusing short windows.
    struct Mean {
        min_points: usize,
        mean: Option<f64>,
    }

    impl Mean {
        fn new(min_points: usize) -> Self {
            Self { min_points, mean: None }
        }
    }

    impl ForecastModel for Mean {
        fn name(&self) -> &str {
            "mean"
        }

        fn train(&mut self, training: &Series, _: Option<&TimeFrame>) -> FitResult<()> {
            if training.len() < self.min_points {
                return Err(ModelError::InsufficientData {
                    needed: self.min_points,
                    got: training.len(),
                });
            }
            self.mean = Some(training.values().iter().sum::<f64>() / training.len() as f64);
            Ok(())
        }

        fn predict(&self, index: &[NaiveDate], _: Option<&TimeFrame>) -> FitResult<Prediction> {
            let mean = self.mean.ok_or(ModelError::NotTrained)?;
            Ok(Prediction::point(index.to_vec(), vec![mean; index.len()]))
        }
    }

    /// Echoes regressor column `x`.
    #[derive(Default)]
    struct Echo;

    impl ForecastModel for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn train(&mut self, training: &Series, regressors: Option<&TimeFrame>) -> FitResult<()> {
            let regressors = regressors.ok_or_else(|| ModelError::Fit("no regressors".into()))?;
            if regressors.index() != training.index() {
                return Err(ModelError::Fit("regressors not aligned".into()));
            }
            Ok(())
        }

        fn predict(
            &self,
            index: &[NaiveDate],
            regressors: Option<&TimeFrame>,
        ) -> FitResult<Prediction> {
            let regressors = regressors.ok_or_else(|| ModelError::Predict("no regressors".into()))?;
            let yhat = index
                .iter()
                .map(|d| {
                    regressors.value_at("x", *d).ok_or(ModelError::MissingRegressor {
                        column: "x".to_string(),
                        date: *d,
                    })
                })
                .collect::<FitResult<Vec<f64>>>()?;
            Ok(Prediction::point(index.to_vec(), yhat))
        }
    }

    /// Returns one row too few.
    #[derive(Default)]
    struct Truncating;

    impl ForecastModel for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn train(&mut self, _: &Series, _: Option<&TimeFrame>) -> FitResult<()> {
            Ok(())
        }

        fn predict(&self, index: &[NaiveDate], _: Option<&TimeFrame>) -> FitResult<Prediction> {
            let n = index.len() - 1;
            Ok(Prediction::point(index[..n].to_vec(), vec![0.0; n]))
        }
    }

    #[test]
    fn test_window_count_and_prediction_lengths() {
        let engine = BacktestEngine::new(LastValue::default, plain());
        let result = engine.run(&linear(100), None).unwrap();

        assert_eq!(result.results.len(), 5);
        for r in &result.results {
            let start = 90 - r.training_length;
            assert_eq!(r.prediction.len(), 100 - start + 10);
            assert_eq!(r.testing_performance.points, 10);
            // Last training value is 90, test values are 91..=100
            assert!((r.testing_performance.mae - 5.5).abs() < 1e-12);
            assert!((r.testing_performance.am + 5.5).abs() < 1e-12);
        }

        // Equal scores keep window order
        let order: Vec<usize> = result.results.iter().map(|r| r.window_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);

        assert_eq!(result.characteristics.name, "last_value");
        assert_eq!(result.characteristics.test_values, 10);
        assert_eq!(result.characteristics.delta_training_values, 20);
        assert!(result.characteristics.extra_regressors.is_empty());
    }

    #[test]
    fn test_absolute_test_values() {
        let engine = BacktestEngine::new(LastValue::default, plain().with_test_values(5));
        let result = engine.run(&linear(100), None).unwrap();
        assert_eq!(result.results.len(), 5);
        for r in &result.results {
            assert_eq!(r.testing_performance.points, 5);
            assert_eq!(r.prediction.len(), r.training_length + 5 + 10);
        }

        let lengths: Vec<usize> = result.results.iter().map(|r| r.training_length).collect();
        assert_eq!(lengths, vec![20, 40, 60, 80, 95]);
    }

    #[test]
    fn test_ranking_and_best_prediction() {
        // 50 tens, 40 zeros, 10 tens held out
        let mut values = vec![10.0; 50];
        values.extend(vec![0.0; 40]);
        values.extend(vec![10.0; 10]);
        let series = Series::new("step", dates(100), values).unwrap();

        let engine = BacktestEngine::new(|| Mean::new(1), plain());
        let result = engine.run(&series, None).unwrap();

        let order: Vec<usize> = result.results.iter().map(|r| r.window_index).collect();
        assert_eq!(order, vec![4, 3, 2, 0, 1]);

        let best = result.best().unwrap();
        assert!((best.testing_performance.mae - 40.0 / 9.0).abs() < 1e-9);

        // Refit on the whole series: 60 tens out of 100
        assert_eq!(result.best_prediction.len(), 110);
        assert!(result.best_prediction.yhat.iter().all(|v| (v - 6.0).abs() < 1e-12));
        assert_eq!(
            result.best_prediction.index.last().copied(),
            Some(NaiveDate::from_ymd_opt(2020, 4, 19).unwrap())
        );
    }

    #[test]
    fn test_rmse_ranking() {
        let mut values = vec![10.0; 50];
        values.extend(vec![0.0; 40]);
        values.extend(vec![10.0; 10]);
        let series = Series::new("step", dates(100), values).unwrap();

        let engine = BacktestEngine::new(
            || Mean::new(1),
            plain().with_estimator(AccuracyEstimator::Rmse),
        );
        let result = engine.run(&series, None).unwrap();
        assert_eq!(result.best().map(|r| r.window_index), Some(4));
        assert_eq!(result.characteristics.main_accuracy_estimator, AccuracyEstimator::Rmse);
    }

    #[test]
    fn test_failing_windows_are_skipped() {
        // Windows have 20, 40, 60, 80 and 90 points
        let engine = BacktestEngine::new(|| Mean::new(50), plain());
        let result = engine.run(&linear(100), None).unwrap();

        let mut indices: Vec<usize> = result.results.iter().map(|r| r.window_index).collect();
        indices.sort();
        assert_eq!(indices, vec![2, 3, 4]);
    }

    #[test]
    fn test_all_windows_failed() {
        let engine = BacktestEngine::new(|| Mean::new(1000), plain());
        let err = engine.run(&linear(100), None).unwrap_err();
        assert!(matches!(err, BacktestError::AllWindowsFailed { attempted: 5, .. }));
    }

    #[test]
    fn test_wrong_prediction_length_drops_window() {
        let engine = BacktestEngine::new(Truncating::default, plain());
        let err = engine.run(&linear(100), None).unwrap_err();
        assert!(matches!(err, BacktestError::AllWindowsFailed { .. }));
    }

    #[test]
    fn test_series_too_short() {
        let params = plain().with_test_values(2).with_delta_training_values(5);
        let engine = BacktestEngine::new(LastValue::default, params);
        let err = engine.run(&linear(3), None).unwrap_err();
        assert!(matches!(err, BacktestError::Configuration { .. }));
    }

    #[test]
    fn test_log_transform_is_inverted() {
        let engine = BacktestEngine::new(LastValue::default, ModelParameters::default());
        let result = engine.run(&linear(100), None).unwrap();
        let best = result.best().unwrap();
        assert!(best.prediction.yhat.iter().all(|v| (v - 90.0).abs() < 1e-9));
        assert!((best.testing_performance.mae - 5.5).abs() < 1e-9);
        assert!(result.best_prediction.yhat.iter().all(|v| (v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_runs_are_idempotent() {
        let engine = BacktestEngine::new(|| Mean::new(1), ModelParameters::default());
        let series = linear(60);
        let first = engine.run(&series, None).unwrap();
        let second = engine.run(&series, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extra_regressors() {
        let series = linear(50);
        let regressors = TimeFrame::new(dates(60))
            .unwrap()
            .with_column("x", (1..=60).map(|v| v as f64).collect())
            .unwrap();

        let params = plain().with_prediction_lags(10);
        let engine = BacktestEngine::new(Echo::default, params);
        let result = engine.run(&series, Some(&regressors)).unwrap();

        assert_eq!(result.characteristics.extra_regressors, vec!["x".to_string()]);
        assert!(result.results.iter().all(|r| r.testing_performance.mae == 0.0));
        assert_eq!(result.best_prediction.yhat.last().copied(), Some(60.0));
    }

    #[test]
    fn test_regressors_missing_horizon() {
        let series = linear(50);
        let regressors = TimeFrame::new(dates(50))
            .unwrap()
            .with_column("x", (1..=50).map(|v| v as f64).collect())
            .unwrap();

        let engine = BacktestEngine::new(Echo::default, plain());
        let err = engine.run(&series, Some(&regressors)).unwrap_err();
        assert!(matches!(err, BacktestError::AllWindowsFailed { .. }));
    }

    #[test]
    fn test_run_frame_isolates_failures() {
        let frame = TimeFrame::new(dates(100))
            .unwrap()
            .with_column("good", (1..=100).map(|v| v as f64).collect())
            .unwrap()
            .with_column("nan", vec![f64::NAN; 100])
            .unwrap();

        let engine = BacktestEngine::new(LastValue::default, plain());
        let outcomes = engine.run_frame(&frame);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].1.is_ok());
        assert!(outcomes[1].1.is_err());
    }
}
