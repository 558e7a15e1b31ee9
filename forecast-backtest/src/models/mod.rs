//! Reference forecasting models.

pub mod baseline;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backtest::{ForecastModel, ModelFactory};

pub use baseline::{LinearTrend, Mean, Naive};

/// Model selector used by configuration files and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Naive,
    Mean,
    LinearTrend,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Naive, ModelKind::Mean, ModelKind::LinearTrend];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Mean => "mean",
            Self::LinearTrend => "linear_trend",
        }
    }
}

impl ModelFactory for ModelKind {
    type Model = Box<dyn ForecastModel>;

    fn build(&self) -> Self::Model {
        match self {
            Self::Naive => Box::new(Naive::new()),
            Self::Mean => Box::new(Mean::new()),
            Self::LinearTrend => Box::new(LinearTrend::new()),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "mean" => Ok(Self::Mean),
            "linear_trend" | "linear" => Ok(Self::LinearTrend),
            other => Err(format!("Unknown model: {}", other)),
        }
    }
}
