//! Error types for dutycal.

use std::fmt;

use chrono::{NaiveDate, Weekday};
use thiserror::Error;

use crate::assignment::AssignmentId;

/// Errors that can occur in dutycal operations.
#[derive(Error, Debug)]
pub enum DutyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No parent is available on {date} ({weekday})")]
    NoAvailableParent { date: NaiveDate, weekday: Weekday },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Calendar service error: {0}")]
    ExternalService(String),

    #[error("Provider not installed: {0}")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("{date}: {source}")]
    OnDate {
        date: NaiveDate,
        #[source]
        source: Box<DutyError>,
    },
}

impl DutyError {
    /// Attach the date being processed when the error surfaced.
    pub fn at_date(self, date: NaiveDate) -> Self {
        DutyError::OnDate {
            date,
            source: Box::new(self),
        }
    }

    /// The innermost error, with any date context peeled off.
    pub fn root(&self) -> &DutyError {
        match self {
            DutyError::OnDate { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), DutyError::Cancelled)
    }

    /// Whether the failure came from the caller's input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            DutyError::Validation(_) | DutyError::NoAvailableParent { .. }
        )
    }
}

/// One assignment that could not be reconciled onto the calendar.
#[derive(Debug)]
pub struct SyncFailure {
    pub date: NaiveDate,
    pub assignment_id: AssignmentId,
    pub cause: DutyError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.date, self.assignment_id, self.cause)
    }
}

/// Every creation failure from a single sync call.
#[derive(Debug)]
pub struct AggregateError {
    failures: Vec<SyncFailure>,
}

impl AggregateError {
    /// Failures are kept sorted by date so the message reads chronologically.
    pub fn new(mut failures: Vec<SyncFailure>) -> Self {
        failures.sort_by_key(|f| f.date);
        AggregateError { failures }
    }

    pub fn failures(&self) -> &[SyncFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 {
            "assignment"
        } else {
            "assignments"
        };
        write!(f, "{} {} failed to sync", self.failures.len(), noun)?;
        for failure in &self.failures {
            write!(f, "\n  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Result type alias for dutycal operations.
pub type DutyResult<T> = Result<T, DutyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_peels_date_context() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let err = DutyError::NoAvailableParent {
            date,
            weekday: Weekday::Mon,
        }
        .at_date(date);

        assert!(err.is_validation());
        assert!(err.to_string().starts_with("2025-01-06: No parent"));
    }

    #[test]
    fn test_aggregate_lists_every_failure_by_date() {
        let later = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let err = AggregateError::new(vec![
            SyncFailure {
                date: later,
                assignment_id: AssignmentId::new(),
                cause: DutyError::ExternalService("quota exceeded".into()),
            },
            SyncFailure {
                date: earlier,
                assignment_id: AssignmentId::new(),
                cause: DutyError::ExternalService("backend error".into()),
            },
        ]);

        assert_eq!(err.len(), 2);
        assert_eq!(err.failures()[0].date, earlier);

        let message = err.to_string();
        assert!(message.starts_with("2 assignments failed to sync"));
        assert!(message.contains("backend error"));
        assert!(message.contains("quota exceeded"));
    }
}
