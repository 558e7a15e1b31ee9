//! Time-series data types, frequency inference and file loading.

pub mod frequency;
pub mod loader;
pub mod types;

pub use frequency::Frequency;
pub use loader::{DataLoader, LoaderError};
pub use types::{DataError, DataResult, Prediction, Series, TimeFrame};
