pub mod analytics;
pub mod backtest;
pub mod data;
pub mod metrics;
pub mod models;
pub mod scenario;
pub mod transform;

// Re-export commonly used types
pub use analytics::{
    CorrelationMode, CrossCorrelationAnalyzer, CrossCorrelationResult, XcorrParameters,
};
pub use backtest::{
    BacktestEngine, BacktestError, ForecastModel, ModelFactory, ModelParameters, ModelResult,
    TrainingWindowResult,
};
pub use data::{DataLoader, Frequency, Prediction, Series, TimeFrame};
pub use metrics::{AccuracyEstimator, PerformanceMetrics, PerformanceScorer};
pub use models::ModelKind;
pub use scenario::{AppConfig, ScenarioRunner};
pub use transform::TransformKind;
