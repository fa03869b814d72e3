//! Calendar entries as seen by dutycal, and the tag that marks ours.
//!
//! Ownership and identity never come from the title. Every entry we create
//! carries an [`EntryTag`] in the provider's private metadata; the title only
//! holds the parent name so a human can read (and change) it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, AssignmentId, ParentId};
use crate::constants::APP_TAG;
use crate::error::{DutyError, DutyResult};

pub const PROP_APP: &str = "dutycal_app";
pub const PROP_ASSIGNMENT_ID: &str = "dutycal_assignment_id";
pub const PROP_PARENT: &str = "dutycal_parent";
pub const PROP_UPDATED_AT: &str = "dutycal_updated_at";

/// Typed view of the private metadata on an entry we own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTag {
    pub app: String,
    pub assignment_id: AssignmentId,
    pub parent: ParentId,
    pub updated_at: DateTime<Utc>,
}

impl EntryTag {
    pub fn for_assignment(assignment: &Assignment) -> Self {
        EntryTag {
            app: APP_TAG.to_string(),
            assignment_id: assignment.id,
            parent: assignment.parent.clone(),
            updated_at: assignment.updated_at,
        }
    }

    pub fn to_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (PROP_APP.to_string(), self.app.clone()),
            (PROP_ASSIGNMENT_ID.to_string(), self.assignment_id.to_string()),
            (PROP_PARENT.to_string(), self.parent.to_string()),
            (PROP_UPDATED_AT.to_string(), self.updated_at.to_rfc3339()),
        ])
    }

    /// Read a tag back from entry metadata.
    ///
    /// `Ok(None)` means the entry belongs to someone else. An entry that claims
    /// our app tag but has missing or malformed fields is an error.
    pub fn from_properties(
        properties: &BTreeMap<String, String>,
        app: &str,
    ) -> DutyResult<Option<Self>> {
        if properties.get(PROP_APP).map(String::as_str) != Some(app) {
            return Ok(None);
        }

        let field = |key: &str| {
            properties
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| DutyError::Validation(format!("Tagged entry is missing '{key}'")))
        };

        let assignment_id = field(PROP_ASSIGNMENT_ID)?.parse()?;
        let parent = ParentId::new(field(PROP_PARENT)?.trim());
        let updated_at = DateTime::parse_from_rfc3339(field(PROP_UPDATED_AT)?)
            .map_err(|e| DutyError::Validation(format!("Invalid '{PROP_UPDATED_AT}': {e}")))?
            .with_timezone(&Utc);

        Ok(Some(EntryTag {
            app: app.to_string(),
            assignment_id,
            parent,
            updated_at,
        }))
    }
}

/// An all-day entry on the external calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider-assigned id; stored on the assignment as `external_ref`.
    pub id: String,
    pub date: NaiveDate,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn tag(&self) -> DutyResult<Option<EntryTag>> {
        EntryTag::from_properties(&self.properties, APP_TAG)
    }
}

/// Content to write when creating or updating an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub date: NaiveDate,
    pub title: String,
    pub description: String,
    pub properties: BTreeMap<String, String>,
}

impl EntryDraft {
    pub fn for_assignment(assignment: &Assignment) -> Self {
        EntryDraft {
            date: assignment.date,
            title: assignment.parent.to_string(),
            description: format!(
                "On duty: {}\nReason: {} ({})",
                assignment.parent,
                assignment.reason.describe(),
                assignment.reason
            ),
            properties: EntryTag::for_assignment(assignment).to_properties(),
        }
    }
}

/// Filter for listing entries. Unset bounds are left to the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_min: Option<DateTime<Utc>>,
    /// Only entries whose app tag equals this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl EntryQuery {
    pub fn between(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        EntryQuery {
            time_min: Some(time_min),
            time_max: Some(time_max),
            ..Default::default()
        }
    }

    pub fn updated_since(updated_min: DateTime<Utc>) -> Self {
        EntryQuery {
            updated_min: Some(updated_min),
            ..Default::default()
        }
    }

    pub fn tagged(mut self, app: &str) -> Self {
        self.tag = Some(app.to_string());
        self
    }

    /// Apply the filter locally, for services without server-side filtering.
    pub fn matches(&self, entry: &RemoteEntry) -> bool {
        // all-day entries overlap the window if they end after time_min
        let starts_at = entry.date.and_time(chrono::NaiveTime::MIN).and_utc();
        let ends_at = starts_at + chrono::Duration::days(1);

        self.time_min.is_none_or(|min| ends_at > min)
            && self.time_max.is_none_or(|max| starts_at < max)
            && self
                .updated_min
                .is_none_or(|min| entry.updated.is_some_and(|u| u >= min))
            && self
                .tag
                .as_deref()
                .is_none_or(|tag| entry.properties.get(PROP_APP).is_some_and(|v| v == tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Reason;
    use crate::fairness::Decision;

    fn assignment() -> Assignment {
        Assignment::decided(
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            Decision {
                parent: ParentId::new("Sam"),
                reason: Reason::ConsecutiveLimit,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_draft_carries_tag_and_reason() {
        let assignment = assignment();
        let draft = EntryDraft::for_assignment(&assignment);

        assert_eq!(draft.title, "Sam");
        assert!(draft.description.contains("consecutive_limit"));

        let tag = EntryTag::from_properties(&draft.properties, APP_TAG)
            .unwrap()
            .unwrap();
        assert_eq!(tag.assignment_id, assignment.id);
        assert_eq!(tag.parent, ParentId::new("Sam"));
    }

    #[test]
    fn test_foreign_entries_have_no_tag() {
        let properties = BTreeMap::from([(PROP_APP.to_string(), "someone-else".to_string())]);
        assert_eq!(EntryTag::from_properties(&properties, APP_TAG).unwrap(), None);
        assert_eq!(EntryTag::from_properties(&BTreeMap::new(), APP_TAG).unwrap(), None);
    }

    #[test]
    fn test_malformed_tag_is_rejected() {
        let mut properties = EntryTag::for_assignment(&assignment()).to_properties();
        properties.insert(PROP_ASSIGNMENT_ID.to_string(), "42".to_string());
        assert!(EntryTag::from_properties(&properties, APP_TAG).is_err());

        properties.remove(PROP_ASSIGNMENT_ID);
        let err = EntryTag::from_properties(&properties, APP_TAG).unwrap_err();
        assert!(err.to_string().contains(PROP_ASSIGNMENT_ID));
    }

    #[test]
    fn test_query_matches_window_and_tag() {
        let assignment = assignment();
        let draft = EntryDraft::for_assignment(&assignment);
        let entry = RemoteEntry {
            id: "evt-1".into(),
            date: draft.date,
            title: draft.title,
            description: Some(draft.description),
            properties: draft.properties,
            updated: Some(Utc::now()),
        };

        let day = crate::date_range::DateRange::single(assignment.date);
        let query = EntryQuery::between(day.from_utc(), day.to_utc()).tagged(APP_TAG);
        assert!(query.matches(&entry));
        assert!(!query.clone().tagged("other").matches(&entry));

        let later = crate::date_range::DateRange::single(assignment.date.succ_opt().unwrap());
        assert!(!EntryQuery::between(later.to_utc(), later.to_utc()).matches(&entry));
    }
}
