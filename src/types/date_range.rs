//! Inclusive calendar-day ranges bounding observation fetches, weather fetches and the dataset grid.

use crate::error::InvalidInput;
use crate::types::traits::any_date::AnyDate;
use chrono::{Duration, Months, NaiveDate};
use std::fmt;

/// An inclusive `[start, end]` range of calendar days with `start < end`.
///
/// # Examples
///
/// ```
/// use piezo_dataset::{DateRange, Year};
/// use chrono::NaiveDate;
///
/// let range = DateRange::from_periods("2023-01-01", Year(2023)).unwrap();
/// assert_eq!(range.end(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
/// assert_eq!(range.days().count(), 365);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting `start >= end` with [`InvalidInput::InvalidRange`].
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidInput> {
        if start >= end {
            return Err(InvalidInput::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a range from the first day of `start` to the last day of `end`.
    pub fn from_periods(
        start: impl AnyDate + fmt::Debug + Clone,
        end: impl AnyDate + fmt::Debug + Clone,
    ) -> Result<Self, InvalidInput> {
        let start_day = start
            .clone()
            .get_date_range()
            .ok_or_else(|| InvalidInput::UnresolvedDate(format!("{:?}", start)))?
            .start;
        let end_day = end
            .clone()
            .get_date_range()
            .ok_or_else(|| InvalidInput::UnresolvedDate(format!("{:?}", end)))?
            .end;
        Self::new(start_day, end_day)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days between start and end (a two-day range spans 1 day).
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Every calendar day in the range, in order, end included.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day <= self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Splits the range into consecutive sub-ranges of at most `years` years.
    ///
    /// Chunks are `[s, min(s + years, end)]`, the next one starting the day after. A trailing
    /// single day is folded into the last chunk, so every chunk is itself a valid range and the
    /// chunks cover the range exactly.
    pub fn chunks(&self, years: u32) -> Vec<DateRange> {
        let Some(step) = years.checked_mul(12).filter(|months| *months > 0) else {
            return vec![*self];
        };
        let mut chunks = Vec::new();
        let mut current = self.start;
        while current < self.end {
            let mut chunk_end = current
                .checked_add_months(Months::new(step))
                .map_or(self.end, |d| d.min(self.end));
            if chunk_end + Duration::days(1) == self.end {
                chunk_end = self.end;
            }
            chunks.push(DateRange {
                start: current,
                end: chunk_end,
            });
            current = chunk_end + Duration::days(1);
        }
        chunks
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
