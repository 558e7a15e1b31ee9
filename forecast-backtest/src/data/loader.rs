//! File loader for time-series tables.
//!
//! Reads CSV or Parquet files with one date column and any number of numeric
//! value columns into a [`TimeFrame`]. Dates may be stored as `%Y-%m-%d`
//! strings or as a native date column. Rows are sorted by date; duplicate
//! dates are rejected.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::types::{DataError, TimeFrame};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Loader for a single data file.
pub struct DataLoader {
    path: String,
    date_column: Option<String>,
}

impl DataLoader {
    /// Create a loader for the file at `path`. The first column is used as
    /// the date column unless [`DataLoader::with_date_column`] says otherwise.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            date_column: None,
        }
    }

    pub fn with_date_column(mut self, name: &str) -> Self {
        self.date_column = Some(name.to_string());
        self
    }

    /// Open the file lazily.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        let path = Path::new(&self.path);
        if !path.exists() {
            return Err(LoaderError::FileNotFound(self.path.clone()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let lf = match extension.as_str() {
            "csv" => LazyCsvReader::new(path).with_has_header(true).finish()?,
            "parquet" => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
            other => return Err(LoaderError::UnsupportedFormat(other.to_string())),
        };
        Ok(lf)
    }

    /// Load the file as a DataFrame.
    pub fn load_dataframe(&self) -> Result<DataFrame, LoaderError> {
        Ok(self.load_lazy()?.collect()?)
    }

    /// Load the file into a time frame.
    pub fn load(&self) -> Result<TimeFrame, LoaderError> {
        let df = self.load_dataframe()?;
        dataframe_to_frame(&df, self.date_column.as_deref())
    }
}

/// Convert a DataFrame into a [`TimeFrame`].
pub fn dataframe_to_frame(
    df: &DataFrame,
    date_column: Option<&str>,
) -> Result<TimeFrame, LoaderError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let date_name = match date_column {
        Some(name) => name.to_string(),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| LoaderError::InvalidData("File has no columns".to_string()))?,
    };

    let dates = read_dates(df, &date_name)?;

    let mut value_columns = Vec::new();
    for name in names.iter().filter(|n| **n != date_name) {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        let values: Vec<f64> = column
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        value_columns.push((name.clone(), values));
    }

    if value_columns.is_empty() {
        return Err(LoaderError::InvalidData(
            "File has no value columns".to_string(),
        ));
    }

    // Sort rows by date
    let mut order: Vec<usize> = (0..dates.len()).collect();
    order.sort_by_key(|&i| dates[i]);
    let sorted_dates: Vec<NaiveDate> = order.iter().map(|&i| dates[i]).collect();

    let mut frame = TimeFrame::new(sorted_dates)?;
    for (name, values) in value_columns {
        frame.push_column(&name, order.iter().map(|&i| values[i]).collect())?;
    }

    debug!(
        "Loaded {} rows x {} columns",
        frame.len(),
        frame.width()
    );
    Ok(frame)
}

fn read_dates(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, LoaderError> {
    let dates_col = df.column(name)?;

    // Handle both string and date column types
    if let Ok(str_col) = dates_col.str() {
        str_col
            .into_iter()
            .enumerate()
            .map(|(row, s)| {
                let s = s.ok_or_else(|| {
                    LoaderError::InvalidData(format!("Missing date in row {}", row))
                })?;
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| {
                    LoaderError::InvalidData(format!("Invalid date '{}' in row {}: {}", s, row, e))
                })
            })
            .collect()
    } else if let Ok(date_col) = dates_col.date() {
        date_col
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                d.map(date_from_days).ok_or_else(|| {
                    LoaderError::InvalidData(format!("Missing date in row {}", row))
                })
            })
            .collect()
    } else {
        Err(LoaderError::InvalidData(format!(
            "{} column has unexpected type",
            name
        )))
    }
}

/// Convert days since the Unix epoch to a date.
fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + 719_163).unwrap_or_default()
}
