//! Core data types for time-series backtesting.
//!
//! A [`Series`] is a single named column over a strictly increasing date
//! index. A [`TimeFrame`] holds several columns sharing one index, and a
//! [`Prediction`] is what a forecasting model hands back.

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frequency::Frequency;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Length mismatch: index has {index} entries, values have {values}")]
    LengthMismatch { index: usize, values: usize },

    #[error("Index is not strictly increasing at position {position} ({date})")]
    UnsortedIndex { position: usize, date: NaiveDate },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Cannot infer a frequency from {0} timestamps")]
    UnknownFrequency(usize),
}

pub type DataResult<T> = Result<T, DataError>;

fn check_index(index: &[NaiveDate]) -> DataResult<()> {
    for (position, pair) in index.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(DataError::UnsortedIndex {
                position: position + 1,
                date: pair[1],
            });
        }
    }
    Ok(())
}

/// A named, date-indexed column of values.
///
/// NaN values are kept as explicit gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    index: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Series {
    /// Create a series, validating that the index is strictly increasing and
    /// matches the values in length.
    pub fn new(name: &str, index: Vec<NaiveDate>, values: Vec<f64>) -> DataResult<Self> {
        if index.len() != values.len() {
            return Err(DataError::LengthMismatch {
                index: index.len(),
                values: values.len(),
            });
        }
        check_index(&index)?;
        Ok(Self {
            name: name.to_string(),
            index,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDate> {
        self.index.first().copied()
    }

    /// Value at a timestamp, if the timestamp is part of the index.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.index
            .binary_search(&date)
            .ok()
            .map(|pos| self.values[pos])
    }

    /// Positional slice of the series.
    pub fn slice(&self, range: Range<usize>) -> Series {
        Series {
            name: self.name.clone(),
            index: self.index[range.clone()].to_vec(),
            values: self.values[range].to_vec(),
        }
    }

    /// Everything from `date` (inclusive) onwards.
    pub fn since(&self, date: NaiveDate) -> Series {
        let start = self.index.partition_point(|d| *d < date);
        self.slice(start..self.len())
    }

    /// Same index, values mapped through `f`.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Series {
        Series {
            name: self.name.clone(),
            index: self.index.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Infer the sampling frequency of the index.
    pub fn frequency(&self) -> DataResult<Frequency> {
        Frequency::infer(&self.index)
    }

    /// Iterate `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }
}

/// Several named columns over one shared date index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFrame {
    index: Vec<NaiveDate>,
    columns: Vec<(String, Vec<f64>)>,
}

impl TimeFrame {
    /// Create an empty frame over the given index.
    pub fn new(index: Vec<NaiveDate>) -> DataResult<Self> {
        check_index(&index)?;
        Ok(Self {
            index,
            columns: Vec::new(),
        })
    }

    /// Add a column. Column order is kept.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> DataResult<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> DataResult<()> {
        if values.len() != self.index.len() {
            return Err(DataError::LengthMismatch {
                index: self.index.len(),
                values: values.len(),
            });
        }
        if self.has_column(name) {
            return Err(DataError::DuplicateColumn(name.to_string()));
        }
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Raw values of a column.
    pub fn values(&self, name: &str) -> DataResult<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    /// A column as a standalone series.
    pub fn series(&self, name: &str) -> DataResult<Series> {
        let values = self.values(name)?;
        Ok(Series {
            name: name.to_string(),
            index: self.index.clone(),
            values: values.to_vec(),
        })
    }

    /// A frame with only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> DataResult<TimeFrame> {
        let mut frame = TimeFrame {
            index: self.index.clone(),
            columns: Vec::with_capacity(names.len()),
        };
        for name in names {
            frame.push_column(name, self.values(name)?.to_vec())?;
        }
        Ok(frame)
    }

    /// Rows whose timestamp is in `dates`. Timestamps missing from the frame
    /// are skipped.
    pub fn rows_at(&self, dates: &[NaiveDate]) -> TimeFrame {
        let positions: Vec<usize> = dates
            .iter()
            .filter_map(|d| self.index.binary_search(d).ok())
            .collect();
        TimeFrame {
            index: positions.iter().map(|&p| self.index[p]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), positions.iter().map(|&p| v[p]).collect()))
                .collect(),
        }
    }

    /// Value of a column at a timestamp.
    pub fn value_at(&self, name: &str, date: NaiveDate) -> Option<f64> {
        let pos = self.index.binary_search(&date).ok()?;
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v[pos])
    }
}

/// Output of a forecasting model over a requested index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub index: Vec<NaiveDate>,
    pub yhat: Vec<f64>,
    pub yhat_lower: Option<Vec<f64>>,
    pub yhat_upper: Option<Vec<f64>>,
}

impl Prediction {
    /// A point forecast without bounds.
    pub fn point(index: Vec<NaiveDate>, yhat: Vec<f64>) -> Self {
        Self {
            index,
            yhat,
            yhat_lower: None,
            yhat_upper: None,
        }
    }

    pub fn with_bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        self.yhat_lower = Some(lower);
        self.yhat_upper = Some(upper);
        self
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Check that every column matches the index in length.
    pub fn is_consistent(&self) -> bool {
        let n = self.index.len();
        self.yhat.len() == n
            && self.yhat_lower.as_ref().map_or(true, |v| v.len() == n)
            && self.yhat_upper.as_ref().map_or(true, |v| v.len() == n)
    }

    /// The `yhat` column as a series.
    pub fn yhat_series(&self, name: &str) -> DataResult<Series> {
        Series::new(name, self.index.clone(), self.yhat.clone())
    }

    /// Only the rows strictly after `date`.
    pub fn after(&self, date: NaiveDate) -> Prediction {
        let start = self.index.partition_point(|d| *d <= date);
        Prediction {
            index: self.index[start..].to_vec(),
            yhat: self.yhat[start..].to_vec(),
            yhat_lower: self.yhat_lower.as_ref().map(|v| v[start..].to_vec()),
            yhat_upper: self.yhat_upper.as_ref().map(|v| v[start..].to_vec()),
        }
    }
}
