//! Backtest configuration.
//!
//! Window sizes can be given as absolute counts or as percentages of the
//! series length. Percentages are resolved once the length is known (see
//! [`WindowPlan`](super::windows::WindowPlan)).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::AccuracyEstimator;
use crate::transform::TransformKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Series too short: {series_len} values, need at least {required}")]
    InsufficientData { series_len: usize, required: usize },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters driving one model's backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Held-out test values. Takes precedence over `test_percentage`.
    pub test_values: Option<usize>,

    /// Held-out test values as a percentage of the series length.
    pub test_percentage: Option<f64>,

    /// Window stride. Takes precedence over `delta_training_percentage`.
    pub delta_training_values: Option<usize>,

    /// Window stride as a percentage of the series length.
    pub delta_training_percentage: Option<f64>,

    /// Points to forecast past the end of the data.
    pub prediction_lags: usize,

    /// Transformation applied before training.
    pub transformation: TransformKind,

    /// Metric used to rank training windows.
    pub main_accuracy_estimator: AccuracyEstimator,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            test_values: None,
            test_percentage: Some(10.0),
            delta_training_values: None,
            delta_training_percentage: Some(20.0),
            prediction_lags: 10,
            transformation: TransformKind::Log,
            main_accuracy_estimator: AccuracyEstimator::Mae,
        }
    }
}

impl ModelParameters {
    /// Check values that do not depend on the series length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prediction_lags == 0 {
            return Err(ConfigError::InvalidParameter(
                "prediction_lags must be at least 1".to_string(),
            ));
        }
        if self.test_values == Some(0) {
            return Err(ConfigError::InvalidParameter(
                "test_values must be at least 1".to_string(),
            ));
        }
        if self.delta_training_values == Some(0) {
            return Err(ConfigError::InvalidParameter(
                "delta_training_values must be at least 1".to_string(),
            ));
        }
        if self.test_values.is_none() && self.test_percentage.is_none() {
            return Err(ConfigError::InvalidParameter(
                "either test_values or test_percentage is required".to_string(),
            ));
        }
        if self.delta_training_values.is_none() && self.delta_training_percentage.is_none() {
            return Err(ConfigError::InvalidParameter(
                "either delta_training_values or delta_training_percentage is required".to_string(),
            ));
        }
        for (name, pct) in [
            ("test_percentage", self.test_percentage),
            ("delta_training_percentage", self.delta_training_percentage),
        ] {
            if let Some(p) = pct {
                if !(p > 0.0 && p <= 100.0) {
                    return Err(ConfigError::InvalidParameter(format!(
                        "{} must be in (0, 100], got {}",
                        name, p
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn with_test_values(mut self, values: usize) -> Self {
        self.test_values = Some(values);
        self
    }

    pub fn with_delta_training_values(mut self, values: usize) -> Self {
        self.delta_training_values = Some(values);
        self
    }

    pub fn with_prediction_lags(mut self, lags: usize) -> Self {
        self.prediction_lags = lags;
        self
    }

    pub fn with_transformation(mut self, kind: TransformKind) -> Self {
        self.transformation = kind;
        self
    }

    pub fn with_estimator(mut self, estimator: AccuracyEstimator) -> Self {
        self.main_accuracy_estimator = estimator;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ModelParameters::default();
        assert_eq!(params.test_percentage, Some(10.0));
        assert_eq!(params.delta_training_percentage, Some(20.0));
        assert_eq!(params.prediction_lags, 10);
        assert_eq!(params.transformation, TransformKind::Log);
        assert_eq!(params.main_accuracy_estimator, AccuracyEstimator::Mae);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let params: ModelParameters = toml::from_str(
            r#"
            test_values = 5
            transformation = "none"
            unknown_key = "ignored"
            "#,
        )
        .unwrap();
        assert_eq!(params.test_values, Some(5));
        assert_eq!(params.transformation, TransformKind::None);
        assert_eq!(params.delta_training_percentage, Some(20.0));
        assert_eq!(params.main_accuracy_estimator, AccuracyEstimator::Mae);
    }

    #[test]
    fn test_parse_estimator() {
        let params: ModelParameters =
            toml::from_str(r#"main_accuracy_estimator = "rmse""#).unwrap();
        assert_eq!(params.main_accuracy_estimator, AccuracyEstimator::Rmse);
    }

    #[test]
    fn test_validate_rejects_zero_lags() {
        let params = ModelParameters::default().with_prediction_lags(0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_percentage() {
        let params = ModelParameters {
            delta_training_percentage: Some(150.0),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_requires_some_test_size() {
        let params = ModelParameters {
            test_percentage: None,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(params.with_test_values(3).validate().is_ok());
    }
}
