//! Backtests every column of a frame with every configured model.
//!
//! The first pass runs without extra regressors. When a regressor threshold
//! is configured, each target then gets the columns whose cross-correlation
//! peak clears it, extended into the future with their own best first-pass
//! forecast. A successful second-pass run replaces the first-pass result of
//! the same model.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analytics::{CrossCorrelationAnalyzer, CrossCorrelationResult};
use crate::backtest::{BacktestEngine, BacktestError, ModelResult};
use crate::data::{DataResult, Series, TimeFrame};
use crate::models::ModelKind;

use super::config::AppConfig;

/// Outcome of one model on one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutcome {
    pub model: ModelKind,
    pub result: Option<ModelResult>,
    pub error: Option<String>,
}

impl ModelOutcome {
    fn from_run(model: ModelKind, run: Result<ModelResult, BacktestError>) -> Self {
        match run {
            Ok(result) => Self {
                model,
                result: Some(result),
                error: None,
            },
            Err(e) => Self {
                model,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Ranking value of the best window, if the run succeeded.
    pub fn best_score(&self) -> Option<f64> {
        self.result.as_ref().and_then(|r| r.best_score())
    }
}

/// Everything computed for one column.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub cross_correlation: Option<CrossCorrelationResult>,
    /// Regressors used by the second pass.
    pub extra_regressors: Vec<String>,
    pub models: Vec<ModelOutcome>,
}

impl ScenarioOutcome {
    /// The model whose best window scores lowest.
    pub fn best_model(&self) -> Option<&ModelOutcome> {
        self.models
            .iter()
            .filter(|m| m.best_score().is_some())
            .min_by(|a, b| {
                a.best_score()
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.best_score().unwrap_or(f64::INFINITY))
            })
    }

    pub fn summary(&self) -> String {
        let mut out = format!("=== {} ===\n", self.scenario);
        if !self.extra_regressors.is_empty() {
            out.push_str(&format!("Extra regressors: {}\n", self.extra_regressors.join(", ")));
        }
        for m in &self.models {
            match (&m.result, &m.error) {
                (Some(result), _) => out.push_str(&result.summary()),
                (None, Some(error)) => out.push_str(&format!("{}: FAILED ({})\n", m.model, error)),
                (None, None) => {}
            }
            out.push('\n');
        }
        out
    }
}

/// Drives the engine over a whole frame.
pub struct ScenarioRunner {
    config: AppConfig,
}

impl ScenarioRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, frame: &TimeFrame) -> Vec<ScenarioOutcome> {
        self.run_with_progress(frame, |_| {})
    }

    /// Like [`run`](Self::run), calling `progress` with the scenario name
    /// after each scenario of each pass.
    pub fn run_with_progress<P: Fn(&str)>(
        &self,
        frame: &TimeFrame,
        progress: P,
    ) -> Vec<ScenarioOutcome> {
        let columns: Vec<&str> = frame.column_names();
        info!(
            "Running {} scenarios with {} models",
            columns.len(),
            self.config.models.len()
        );

        let mut outcomes: Vec<ScenarioOutcome> = columns
            .iter()
            .map(|&column| {
                let outcome = ScenarioOutcome {
                    scenario: column.to_string(),
                    cross_correlation: self.cross_correlation(frame, column),
                    extra_regressors: Vec::new(),
                    models: self.backtest_all(frame, column, None),
                };
                progress(column);
                outcome
            })
            .collect();

        let Some((xcorr, threshold)) = self.config.regressor_selection() else {
            return outcomes;
        };

        // Second pass reads first-pass forecasts of other scenarios
        let first_pass = outcomes.clone();
        for outcome in outcomes.iter_mut() {
            let Some(correlation) = &outcome.cross_correlation else {
                progress(&outcome.scenario);
                continue;
            };

            let selected = correlation.select_extra_regressors(xcorr.xcorr_mode_target, threshold);
            if selected.is_empty() {
                debug!("No extra regressors for '{}'", outcome.scenario);
                progress(&outcome.scenario);
                continue;
            }

            let regressors = match self.regressor_frame(frame, &selected, &first_pass) {
                Ok(Some(regressors)) => regressors,
                Ok(None) => {
                    progress(&outcome.scenario);
                    continue;
                }
                Err(e) => {
                    warn!("Cannot build regressors for '{}': {}", outcome.scenario, e);
                    progress(&outcome.scenario);
                    continue;
                }
            };

            info!(
                "Second pass for '{}' with regressors: {}",
                outcome.scenario,
                regressors.column_names().join(", ")
            );

            let second = self.backtest_all(frame, &outcome.scenario, Some(&regressors));
            for (current, candidate) in outcome.models.iter_mut().zip(second) {
                if candidate.result.is_some() {
                    *current = candidate;
                } else if let Some(error) = &candidate.error {
                    warn!(
                        "Keeping first pass of '{}' on '{}': {}",
                        current.model, outcome.scenario, error
                    );
                }
            }
            outcome.extra_regressors = regressors
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            progress(&outcome.scenario);
        }

        outcomes
    }

    fn cross_correlation(&self, frame: &TimeFrame, column: &str) -> Option<CrossCorrelationResult> {
        let xcorr = self.config.xcorr_parameters.as_ref()?;
        let result = CrossCorrelationAnalyzer::compute(
            column,
            frame,
            xcorr.xcorr_max_lags,
            &xcorr.xcorr_modes,
        );
        match result {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Cross-correlation of '{}' failed: {}", column, e);
                None
            }
        }
    }

    fn backtest_all(
        &self,
        frame: &TimeFrame,
        column: &str,
        regressors: Option<&TimeFrame>,
    ) -> Vec<ModelOutcome> {
        let series = frame.series(column);
        self.config
            .models
            .iter()
            .map(|kind| {
                let run = match &series {
                    Ok(series) => {
                        BacktestEngine::new(*kind, self.config.model_parameters.clone())
                            .run(series, regressors)
                    }
                    Err(e) => Err(BacktestError::Data(e.clone())),
                };
                if let Err(e) = &run {
                    warn!("Model '{}' failed on '{}': {}", kind, column, e);
                }
                ModelOutcome::from_run(*kind, run)
            })
            .collect()
    }

    /// History of each selected column extended with its best first-pass
    /// forecast. Columns without a usable forecast are dropped.
    fn regressor_frame(
        &self,
        frame: &TimeFrame,
        selected: &[String],
        first_pass: &[ScenarioOutcome],
    ) -> DataResult<Option<TimeFrame>> {
        let last = match frame.index().last() {
            Some(last) => *last,
            None => return Ok(None),
        };

        let mut extended: Vec<Series> = Vec::new();
        for column in selected {
            let forecast = first_pass
                .iter()
                .find(|o| o.scenario == *column)
                .and_then(|o| o.best_model())
                .and_then(|m| m.result.as_ref())
                .map(|r| r.forecast_after(last));

            match forecast {
                Some(forecast) if !forecast.is_empty() => {
                    let history = frame.series(column)?;
                    extended.push(concat(&history, &forecast.index, &forecast.yhat)?);
                }
                _ => warn!("Dropping regressor '{}': no forecast available", column),
            }
        }

        if extended.is_empty() {
            return Ok(None);
        }

        // All forecasts share the horizon, but keep only dates every column has
        let common: Vec<NaiveDate> = extended[0]
            .index()
            .iter()
            .copied()
            .filter(|d| extended.iter().all(|s| s.get(*d).is_some()))
            .collect();

        let mut regressors = TimeFrame::new(common.clone())?;
        for s in &extended {
            let values = common.iter().map(|d| s.get(*d).unwrap_or(f64::NAN)).collect();
            regressors.push_column(s.name(), values)?;
        }
        Ok(Some(regressors))
    }
}

fn concat(history: &Series, dates: &[NaiveDate], values: &[f64]) -> DataResult<Series> {
    let mut index = history.index().to_vec();
    index.extend_from_slice(dates);
    let mut all = history.values().to_vec();
    all.extend_from_slice(values);
    Series::new(history.name(), index, all)
}
