//! Forecasting model contract.
//!
//! The engine never shares a model between windows: it owns a
//! [`ModelFactory`] and builds a fresh instance for every fit.

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::{Prediction, Series, TimeFrame};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Not enough training data: need {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Model has not been trained")]
    NotTrained,

    #[error("Missing extra regressor '{column}' at {date}")]
    MissingRegressor { column: String, date: NaiveDate },

    #[error("Fit failed: {0}")]
    Fit(String),

    #[error("Prediction failed: {0}")]
    Predict(String),
}

pub type FitResult<T> = Result<T, ModelError>;

/// A forecasting model.
///
/// `train` receives the (already transformed) training slice and, when the
/// caller uses them, extra regressors covering at least the training index.
/// `predict` is asked for values on `future_index`, which starts at the first
/// training timestamp and runs past the end of the data; regressors then cover
/// that whole index. The returned prediction must use exactly `future_index`.
/// Bound columns are optional.
pub trait ForecastModel: Send {
    fn name(&self) -> &str;

    fn train(&mut self, training: &Series, extra_regressors: Option<&TimeFrame>) -> FitResult<()>;

    fn predict(
        &self,
        future_index: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> FitResult<Prediction>;
}

/// Builds fresh model instances.
pub trait ModelFactory: Send + Sync {
    type Model: ForecastModel;

    fn build(&self) -> Self::Model;
}

impl<F, M> ModelFactory for F
where
    F: Fn() -> M + Send + Sync,
    M: ForecastModel,
{
    type Model = M;

    fn build(&self) -> M {
        self()
    }
}

impl ForecastModel for Box<dyn ForecastModel> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn train(&mut self, training: &Series, extra_regressors: Option<&TimeFrame>) -> FitResult<()> {
        self.as_mut().train(training, extra_regressors)
    }

    fn predict(
        &self,
        future_index: &[NaiveDate],
        extra_regressors: Option<&TimeFrame>,
    ) -> FitResult<Prediction> {
        self.as_ref().predict(future_index, extra_regressors)
    }
}
