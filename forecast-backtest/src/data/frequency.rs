//! Sampling frequency inference.
//!
//! Extends a date index into the future. Daily, weekly and other fixed-step
//! indexes step by days; monthly, quarterly and yearly indexes step by
//! calendar months with day-of-month clamping.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{DataError, DataResult};

/// Step between consecutive timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Days(i64),
    Months(u32),
}

impl Frequency {
    /// Infer the frequency of a strictly increasing index.
    ///
    /// A constant day step wins. Otherwise, if every step is the same number
    /// of calendar months, the index is monthly. Anything else falls back to
    /// the most common day step.
    pub fn infer(index: &[NaiveDate]) -> DataResult<Frequency> {
        if index.len() < 2 {
            return Err(DataError::UnknownFrequency(index.len()));
        }

        let day_steps: Vec<i64> = index
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .collect();

        if day_steps.iter().all(|d| *d == day_steps[0]) {
            return Ok(Frequency::Days(day_steps[0]));
        }

        let month_steps: Vec<i32> = index
            .windows(2)
            .map(|w| months_between(w[0], w[1]))
            .collect();
        let first = month_steps[0];
        if first > 0
            && month_steps.iter().all(|m| *m == first)
            && index
                .windows(2)
                .all(|w| add_months(w[0], first as u32) == w[1])
        {
            return Ok(Frequency::Months(first as u32));
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for step in &day_steps {
            *counts.entry(*step).or_insert(0) += 1;
        }
        let step = counts
            .into_iter()
            .max_by(|(sa, ca), (sb, cb)| ca.cmp(cb).then(sb.cmp(sa)))
            .map(|(step, _)| step)
            .unwrap_or(1);
        debug!("Irregular index, using most common step of {} days", step);
        Ok(Frequency::Days(step))
    }

    /// Advance a date by `steps` periods.
    pub fn advance(&self, date: NaiveDate, steps: u32) -> NaiveDate {
        match self {
            Frequency::Days(days) => date + Duration::days(days * steps as i64),
            Frequency::Months(months) => add_months(date, months * steps),
        }
    }

    /// The `count` timestamps following `last`.
    pub fn future_index(&self, last: NaiveDate, count: usize) -> Vec<NaiveDate> {
        (1..=count as u32).map(|i| self.advance(last, i)).collect()
    }
}

/// Add months to a date, clamping the day to the target month's length.
fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.month0() as i64 + months as i64;
    let year = date.year() + (total / 12) as i32;
    let month = (total % 12) as u32 + 1;

    let day = if is_month_end(date) {
        days_in_month(year, month)
    } else {
        date.day().min(days_in_month(year, month))
    };
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

fn is_month_end(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}

/// Get the number of days in a month.
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// Whole calendar months between two dates.
fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32
}
