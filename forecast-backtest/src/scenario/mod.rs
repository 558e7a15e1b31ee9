//! Multi-series scenario runs driven by an application config.

pub mod config;
pub mod runner;

pub use config::AppConfig;
pub use runner::{ModelOutcome, ScenarioOutcome, ScenarioRunner};
