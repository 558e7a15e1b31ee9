//! Rolling-origin backtesting of forecasting models.
//!
//! This module provides the backtest framework:
//! - Window planning from absolute or percentage sizes
//! - The model contract and factories
//! - Parallel per-window fitting and scoring
//! - Ranking and the refit best prediction

pub mod config;
pub mod engine;
pub mod model;
pub mod result;
pub mod windows;

pub use config::{ConfigError, ModelParameters};
pub use engine::{BacktestEngine, BacktestError};
pub use model::{FitResult, ForecastModel, ModelError, ModelFactory};
pub use result::{ModelCharacteristics, ModelResult, TrainingWindowResult};
pub use windows::{TrainingWindow, WindowPlan};
