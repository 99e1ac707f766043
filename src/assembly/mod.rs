//! Table assembly: the (station × date) grid, observation merging and column projection.

pub mod grid;
pub mod merge;
pub mod projection;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

// 1970-01-01 counted from 0001-01-01 (proleptic Gregorian).
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A polars `Date` column holding `dates`.
pub(crate) fn date_column(name: &str, dates: &[NaiveDate]) -> PolarsResult<Column> {
    let days: Vec<i32> = dates
        .iter()
        .map(|date| date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}
