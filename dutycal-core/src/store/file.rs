//! TOML-backed store.
//!
//! Everything lives in a single state file:
//!
//! ```toml
//! [[assignment]]
//! id = "7f0c..."
//! date = "2025-05-01"
//! parent = "Alex"
//! overridden = false
//! reason = "alternating"
//! updated_at = "2025-04-30T21:00:00Z"
//!
//! [[subscription]]
//! subscription_id = "..."
//! ```
//!
//! The file is rewritten after every change, through a temp file and a rename.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assignment::Assignment;
use crate::date_range::DateRange;
use crate::error::{DutyError, DutyResult};
use crate::fairness::Stats;
use crate::remote::subscription::NotificationSubscription;
use crate::store::state::StoreState;
use crate::store::{AssignmentStore, SubscriptionStore};

#[derive(Deserialize, Default)]
struct StateFile {
    #[serde(default)]
    assignment: Vec<toml::Value>,
    #[serde(default)]
    subscription: Vec<NotificationSubscription>,
}

#[derive(Serialize)]
struct StateFileRef<'a> {
    assignment: Vec<&'a Assignment>,
    subscription: Vec<&'a NotificationSubscription>,
}

pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open the state file at `path`, starting empty if it does not exist yet.
    ///
    /// Assignment records that fail to parse or validate are skipped with a
    /// warning instead of failing the whole load.
    pub fn open(path: impl Into<PathBuf>) -> DutyResult<Self> {
        let path = path.into();

        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            parse_state(&content, &path)?
        } else {
            StoreState::default()
        };

        debug!(
            path = %path.display(),
            assignments = state.assignments.len(),
            subscriptions = state.subscriptions.len(),
            "Opened state file"
        );

        Ok(FileStore {
            path,
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the state, persist it, then make it current.
    fn mutate(&self, change: impl FnOnce(&mut StoreState) -> DutyResult<()>) -> DutyResult<()> {
        let mut state = self.state();
        let mut next = state.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, state: &StoreState) -> DutyResult<()> {
        let file = StateFileRef {
            assignment: state.assignments.values().collect(),
            subscription: state.subscriptions.values().collect(),
        };
        let content = toml::to_string(&file)
            .map_err(|e| DutyError::Serialization(format!("Failed to encode state: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        std::fs::write(&temp, content)
            .and_then(|_| std::fs::rename(&temp, &self.path))
            .map_err(|e| {
                DutyError::Persistence(format!("Failed to write {}: {e}", self.path.display()))
            })
    }
}

fn parse_state(content: &str, path: &Path) -> DutyResult<StoreState> {
    let file: StateFile = toml::from_str(content).map_err(|e| {
        DutyError::Persistence(format!("Failed to parse {}: {e}", path.display()))
    })?;

    let mut state = StoreState::default();

    for value in file.assignment {
        let assignment = match value.try_into::<Assignment>() {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!(path = %path.display(), "Skipping unreadable assignment: {e}");
                continue;
            }
        };
        if let Err(e) = state.upsert(&assignment) {
            warn!(path = %path.display(), "Skipping invalid assignment: {e}");
        }
    }

    for subscription in file.subscription {
        state
            .subscriptions
            .insert(subscription.subscription_id.clone(), subscription);
    }

    Ok(state)
}

#[async_trait]
impl AssignmentStore for FileStore {
    async fn get_by_date(&self, date: NaiveDate) -> DutyResult<Option<Assignment>> {
        Ok(self.state().assignments.get(&date).cloned())
    }

    async fn get_by_external_ref(&self, external_ref: &str) -> DutyResult<Option<Assignment>> {
        Ok(self.state().by_external_ref(external_ref))
    }

    async fn upsert(&self, assignment: &Assignment) -> DutyResult<()> {
        self.mutate(|state| state.upsert(assignment))
    }

    async fn query_range(&self, range: &DateRange) -> DutyResult<Vec<Assignment>> {
        Ok(self.state().range(range))
    }

    async fn stats_before(&self, date: NaiveDate) -> DutyResult<Stats> {
        Ok(self.state().stats_before(date))
    }

    async fn recent_before(&self, date: NaiveDate, limit: usize) -> DutyResult<Vec<Assignment>> {
        Ok(self.state().recent_before(date, limit))
    }
}

#[async_trait]
impl SubscriptionStore for FileStore {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> DutyResult<Option<NotificationSubscription>> {
        Ok(self.state().subscriptions.get(subscription_id).cloned())
    }

    async fn list_subscriptions(&self) -> DutyResult<Vec<NotificationSubscription>> {
        Ok(self.state().subscriptions.values().cloned().collect())
    }

    async fn save_subscription(&self, subscription: &NotificationSubscription) -> DutyResult<()> {
        self.mutate(|state| {
            state
                .subscriptions
                .insert(subscription.subscription_id.clone(), subscription.clone());
            Ok(())
        })
    }

    async fn delete_subscription(&self, subscription_id: &str) -> DutyResult<()> {
        self.mutate(|state| {
            state.subscriptions.remove(subscription_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{ParentId, Reason};
    use crate::fairness::Decision;
    use chrono::{Duration, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn assignment(parent: &str, on: NaiveDate) -> Assignment {
        Assignment::decided(
            on,
            Decision {
                parent: ParentId::new(parent),
                reason: Reason::TotalCountBalance,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");

        let mut overridden = assignment("A", date(2));
        overridden.apply_override(ParentId::new("B"), Utc::now());
        overridden.set_external_ref("evt-2", Utc::now());
        let subscription = NotificationSubscription {
            subscription_id: "channel-1".into(),
            resource_ref: "resource-1".into(),
            calendar_ref: "primary".into(),
            expires_at: Utc::now() + Duration::days(7),
        };

        {
            let store = FileStore::open(&path).unwrap();
            store.upsert(&assignment("A", date(1))).await.unwrap();
            store.upsert(&overridden).await.unwrap();
            store.save_subscription(&subscription).await.unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        let reloaded = store.get_by_date(date(2)).await.unwrap().unwrap();
        assert_eq!(reloaded.id, overridden.id);
        assert!(reloaded.overridden);
        assert_eq!(reloaded.reason, Reason::Override);
        assert_eq!(reloaded.external_ref.as_deref(), Some("evt-2"));

        let subs = store.list_subscriptions().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].resource_ref, "resource-1");
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested/state.toml")).unwrap();

        assert!(store.get_by_date(date(1)).await.unwrap().is_none());
        store.upsert(&assignment("A", date(1))).await.unwrap();
        assert!(dir.path().join("nested/state.toml").exists());
    }

    #[test]
    fn test_load_skips_unknown_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(
            &path,
            r#"
[[assignment]]
id = "6f1c2a8e-5b7d-4c11-9a0e-3d2b1f4e5a6c"
date = "2025-06-01"
parent = "A"
overridden = false
reason = "coin_flip"
updated_at = "2025-05-31T20:00:00Z"

[[assignment]]
id = "0b9e8d7c-6a5f-4e3d-8c2b-1a0f9e8d7c6b"
date = "2025-06-02"
parent = "B"
overridden = false
reason = "alternating"
updated_at = "2025-05-31T20:00:00Z"
"#,
        )
        .unwrap();

        let store = FileStore::open(&path).unwrap();
        let state = store.state();
        assert_eq!(state.assignments.len(), 1);
        assert!(state.assignments.contains_key(&date(2)));
    }

    #[test]
    fn test_load_rejects_broken_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "[[assignment]\n").unwrap();

        let err = FileStore::open(&path).err().unwrap();
        assert!(matches!(err, DutyError::Persistence(_)));
    }
}
