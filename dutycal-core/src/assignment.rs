//! The duty assignment record and its identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DutyError, DutyResult};
use crate::fairness::Decision;

/// Stable identity of an assignment. Survives date edits made on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        AssignmentId(Uuid::new_v4())
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AssignmentId {
    type Err = DutyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(AssignmentId)
            .map_err(|e| DutyError::Validation(format!("Invalid assignment id '{s}': {e}")))
    }
}

/// One of the two configured parent identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(name: impl Into<String>) -> Self {
        ParentId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a parent was picked for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reason {
    Unavailability,
    TotalCountBalance,
    RecentCountBalance,
    ConsecutiveLimit,
    Alternating,
    Override,
}

impl Reason {
    pub const ALL: [Reason; 6] = [
        Reason::Unavailability,
        Reason::TotalCountBalance,
        Reason::RecentCountBalance,
        Reason::ConsecutiveLimit,
        Reason::Alternating,
        Reason::Override,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Unavailability => "unavailability",
            Reason::TotalCountBalance => "total_count_balance",
            Reason::RecentCountBalance => "recent_count_balance",
            Reason::ConsecutiveLimit => "consecutive_limit",
            Reason::Alternating => "alternating",
            Reason::Override => "override",
        }
    }

    /// Human-readable explanation, embedded in calendar entry descriptions.
    pub fn describe(&self) -> &'static str {
        match self {
            Reason::Unavailability => "the other parent is unavailable on this weekday",
            Reason::TotalCountBalance => "fewest duty days overall",
            Reason::RecentCountBalance => "fewest duty days in the last 30 days",
            Reason::ConsecutiveLimit => "the other parent already had two days in a row",
            Reason::Alternating => "alternating with the previous day",
            Reason::Override => "set manually on the calendar",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = DutyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DutyError::Validation(format!("Unknown assignment reason '{s}'")))
    }
}

impl TryFrom<String> for Reason {
    type Error = DutyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reason> for String {
    fn from(reason: Reason) -> Self {
        reason.as_str().to_string()
    }
}

/// Which parent is on duty for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub date: NaiveDate,
    pub parent: ParentId,
    pub overridden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub reason: Reason,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// A fresh assignment produced by the fairness rules.
    pub fn decided(date: NaiveDate, decision: Decision, now: DateTime<Utc>) -> Self {
        Assignment {
            id: AssignmentId::new(),
            date,
            parent: decision.parent,
            overridden: false,
            external_ref: None,
            reason: decision.reason,
            updated_at: now,
        }
    }

    /// Freeze this day on `parent`. The fairness rules never touch it again.
    pub fn apply_override(&mut self, parent: ParentId, now: DateTime<Utc>) {
        self.parent = parent;
        self.overridden = true;
        self.reason = Reason::Override;
        self.updated_at = now;
    }

    pub fn set_external_ref(&mut self, external_ref: impl Into<String>, now: DateTime<Utc>) {
        self.external_ref = Some(external_ref.into());
        self.updated_at = now;
    }

    /// Reject records where the override flag and reason disagree.
    pub fn validate(&self) -> DutyResult<()> {
        if self.overridden != (self.reason == Reason::Override) {
            return Err(DutyError::Validation(format!(
                "Assignment {} on {} has overridden={} but reason '{}'",
                self.id, self.date, self.overridden, self.reason
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Assignment {
        Assignment::decided(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            Decision {
                parent: ParentId::new("A"),
                reason: Reason::Alternating,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_reason_rejects_unknown_values() {
        let err = "coin_flip".parse::<Reason>().unwrap_err();
        assert!(err.is_validation());

        let json = r#""total_count_balance""#;
        let reason: Reason = serde_json::from_str(json).unwrap();
        assert_eq!(reason, Reason::TotalCountBalance);
        assert!(serde_json::from_str::<Reason>(r#""TotalCountBalance""#).is_err());
    }

    #[test]
    fn test_apply_override_keeps_invariant() {
        let mut assignment = sample();
        assert!(assignment.validate().is_ok());

        assignment.apply_override(ParentId::new("B"), Utc::now());

        assert!(assignment.overridden);
        assert_eq!(assignment.reason, Reason::Override);
        assert_eq!(assignment.parent, ParentId::new("B"));
        assert!(assignment.validate().is_ok());
    }

    #[test]
    fn test_validate_flags_mismatched_override() {
        let mut assignment = sample();
        assignment.overridden = true;
        assert!(assignment.validate().is_err());
    }

    #[test]
    fn test_assignment_id_parse() {
        let id = AssignmentId::new();
        assert_eq!(id.to_string().parse::<AssignmentId>().unwrap(), id);
        assert!("not-a-uuid".parse::<AssignmentId>().is_err());
    }
}
