//! Series analytics module.
//!
//! Provides:
//! - Correlation measures (pearson, kendall, spearman, matlab-normalized)
//! - Lag-indexed cross-correlation and extra-regressor selection
//! - Autocorrelation with confidence bands

pub mod autocorrelation;
pub mod correlation;
pub mod cross_correlation;

pub use autocorrelation::{autocorrelation, Autocorrelation};
pub use correlation::CorrelationMode;
pub use cross_correlation::{
    CorrelationCurve, CorrelationPeak, CrossCorrelationAnalyzer, CrossCorrelationResult,
    XcorrParameters,
};
