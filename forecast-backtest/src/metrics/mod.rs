//! Forecast accuracy metrics.
//!
//! Provides:
//! - MAE, MSE, RMSE
//! - AM (arithmetic mean of signed errors, shows bias direction)
//! - Ranking of training windows by a chosen estimator

pub mod scorer;

pub use scorer::{AccuracyEstimator, PerformanceMetrics, PerformanceScorer, ScoreError};
