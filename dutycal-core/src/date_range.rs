//! Inclusive calendar date ranges.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::assignment::Assignment;
use crate::constants::DEFAULT_SCHEDULE_DAYS;
use crate::error::{DutyError, DutyResult};

/// Inclusive range of calendar days. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DutyResult<Self> {
        if start > end {
            return Err(DutyError::Validation(format!(
                "Invalid date range: {start} is after {end}"
            )));
        }
        Ok(DateRange { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        DateRange {
            start: date,
            end: date,
        }
    }

    /// Parse CLI-style bounds.
    /// - `from`: YYYY-MM-DD, defaults to `today`
    /// - `to`: YYYY-MM-DD, defaults to DEFAULT_SCHEDULE_DAYS after `from`
    pub fn from_args(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> DutyResult<Self> {
        let start = match from {
            Some(s) => parse_date(s)?,
            None => today,
        };

        let end = match to {
            Some(s) => parse_date(s)?,
            None => start + Duration::days(DEFAULT_SCHEDULE_DAYS - 1),
        };

        Self::new(start, end)
    }

    /// Smallest range covering every assignment's date, `None` when empty.
    pub fn spanning<'a>(assignments: impl IntoIterator<Item = &'a Assignment>) -> Option<Self> {
        let mut dates = assignments.into_iter().map(|a| a.date);
        let first = dates.next()?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateRange { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered, counting both ends.
    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Widen by `days` on both sides.
    pub fn padded(&self, days: i64) -> Self {
        DateRange {
            start: self.start - Duration::days(days),
            end: self.end + Duration::days(days),
        }
    }

    /// Start of the first day, UTC.
    pub fn from_utc(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Start of the day after the last day, UTC (exclusive bound).
    pub fn to_utc(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
    }
}

fn parse_date(s: &str) -> DutyResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        DutyError::Validation(format!("Invalid date format '{s}'. Expected YYYY-MM-DD"))
    })
}
