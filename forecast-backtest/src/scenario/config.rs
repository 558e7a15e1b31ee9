//! Application configuration loaded from TOML.
//!
//! ```toml
//! models = ["naive", "linear_trend"]
//!
//! [model_parameters]
//! test_percentage = 10
//! delta_training_percentage = 20
//! prediction_lags = 10
//! transformation = "log"
//! main_accuracy_estimator = "mae"
//!
//! [xcorr_parameters]
//! xcorr_max_lags = 120
//! xcorr_modes = ["pearson", "kendall"]
//! xcorr_mode_target = "pearson"
//! xcorr_extra_regressor_threshold = 0.8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::XcorrParameters;
use crate::backtest::{ConfigError, ModelParameters};
use crate::models::ModelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model_parameters: ModelParameters,
    /// Cross-correlation is skipped when absent.
    pub xcorr_parameters: Option<XcorrParameters>,
    pub models: Vec<ModelKind>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_parameters: ModelParameters::default(),
            xcorr_parameters: None,
            models: ModelKind::ALL.to_vec(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model_parameters.validate()?;

        if self.models.is_empty() {
            return Err(ConfigError::InvalidParameter(
                "at least one model is required".to_string(),
            ));
        }

        if let Some(xcorr) = &self.xcorr_parameters {
            if xcorr.xcorr_modes.is_empty() {
                return Err(ConfigError::InvalidParameter(
                    "xcorr_modes must not be empty".to_string(),
                ));
            }
            if xcorr.xcorr_extra_regressor_threshold.is_some()
                && !xcorr.xcorr_modes.contains(&xcorr.xcorr_mode_target)
            {
                return Err(ConfigError::InvalidParameter(format!(
                    "xcorr_mode_target '{}' is not one of xcorr_modes",
                    xcorr.xcorr_mode_target
                )));
            }
            if let Some(threshold) = xcorr.xcorr_extra_regressor_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(ConfigError::InvalidParameter(format!(
                        "xcorr_extra_regressor_threshold must be in [0, 1], got {}",
                        threshold
                    )));
                }
            }
        }

        Ok(())
    }

    /// Regressor selection settings, when the second pass is enabled.
    pub fn regressor_selection(&self) -> Option<(&XcorrParameters, f64)> {
        self.xcorr_parameters
            .as_ref()
            .and_then(|x| x.xcorr_extra_regressor_threshold.map(|t| (x, t)))
    }
}
