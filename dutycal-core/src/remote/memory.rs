//! In-process calendar used for dry runs and tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::assignment::AssignmentId;
use crate::error::{DutyError, DutyResult};
use crate::remote::CalendarService;
use crate::remote::entry::{EntryDraft, EntryQuery, PROP_ASSIGNMENT_ID, RemoteEntry};
use crate::remote::subscription::NotificationSubscription;

const WATCH_TTL_DAYS: i64 = 30;

#[derive(Default)]
struct CalendarState {
    entries: BTreeMap<String, RemoteEntry>,
    next_id: u64,
    failing_gets: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_creates: HashSet<AssignmentId>,
    failing_watch: bool,
    subscriptions: Vec<NotificationSubscription>,
    stopped: Vec<String>,
}

impl CalendarState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// A calendar kept entirely in memory, with switches to make individual
/// operations fail.
#[derive(Default)]
pub struct MemoryCalendar {
    state: Mutex<CalendarState>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CalendarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All entries, ordered by id.
    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.state().entries.values().cloned().collect()
    }

    pub fn entry(&self, entry_id: &str) -> Option<RemoteEntry> {
        self.state().entries.get(entry_id).cloned()
    }

    /// Entries whose tag points at `assignment_id`.
    pub fn entries_for(&self, assignment_id: AssignmentId) -> Vec<RemoteEntry> {
        let id = assignment_id.to_string();
        self.state()
            .entries
            .values()
            .filter(|e| e.properties.get(PROP_ASSIGNMENT_ID) == Some(&id))
            .cloned()
            .collect()
    }

    /// Put an entry in place as-is, as if someone else had written it.
    pub fn insert(&self, entry: RemoteEntry) {
        self.state().entries.insert(entry.id.clone(), entry);
    }

    /// Rename an entry the way a person editing the calendar would.
    pub fn retitle(&self, entry_id: &str, title: &str) -> DutyResult<()> {
        let mut state = self.state();
        let entry = state
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| DutyError::NotFound(format!("entry {entry_id}")))?;
        entry.title = title.to_string();
        entry.updated = Some(Utc::now());
        Ok(())
    }

    pub fn fail_get(&self, entry_id: &str) {
        self.state().failing_gets.insert(entry_id.to_string());
    }

    pub fn fail_delete(&self, entry_id: &str) {
        self.state().failing_deletes.insert(entry_id.to_string());
    }

    pub fn fail_create_for(&self, assignment_id: AssignmentId) {
        self.state().failing_creates.insert(assignment_id);
    }

    pub fn fail_watch(&self, failing: bool) {
        self.state().failing_watch = failing;
    }

    pub fn subscriptions(&self) -> Vec<NotificationSubscription> {
        self.state().subscriptions.clone()
    }

    /// Ids of subscriptions that were stopped.
    pub fn stopped(&self) -> Vec<String> {
        self.state().stopped.clone()
    }
}

fn entry_from_draft(id: String, draft: &EntryDraft) -> RemoteEntry {
    RemoteEntry {
        id,
        date: draft.date,
        title: draft.title.clone(),
        description: Some(draft.description.clone()),
        properties: draft.properties.clone(),
        updated: Some(Utc::now()),
    }
}

#[async_trait]
impl CalendarService for MemoryCalendar {
    async fn list_entries(&self, query: &EntryQuery) -> DutyResult<Vec<RemoteEntry>> {
        Ok(self
            .state()
            .entries
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    async fn get_entry(&self, entry_id: &str) -> DutyResult<Option<RemoteEntry>> {
        let state = self.state();
        if state.failing_gets.contains(entry_id) {
            return Err(DutyError::ExternalService(format!(
                "Failed to fetch entry {entry_id}"
            )));
        }
        Ok(state.entries.get(entry_id).cloned())
    }

    async fn create_entry(&self, draft: &EntryDraft) -> DutyResult<RemoteEntry> {
        let mut state = self.state();

        let failing = draft
            .properties
            .get(PROP_ASSIGNMENT_ID)
            .and_then(|id| id.parse::<AssignmentId>().ok())
            .is_some_and(|id| state.failing_creates.contains(&id));
        if failing {
            return Err(DutyError::ExternalService(format!(
                "Failed to create entry for {}",
                draft.date
            )));
        }

        let id = state.allocate_id("entry");
        let entry = entry_from_draft(id.clone(), draft);
        state.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, entry_id: &str, draft: &EntryDraft) -> DutyResult<RemoteEntry> {
        let mut state = self.state();
        if !state.entries.contains_key(entry_id) {
            return Err(DutyError::ExternalService(format!(
                "Entry {entry_id} not found"
            )));
        }
        let entry = entry_from_draft(entry_id.to_string(), draft);
        state.entries.insert(entry_id.to_string(), entry.clone());
        Ok(entry)
    }

    async fn delete_entry(&self, entry_id: &str) -> DutyResult<()> {
        let mut state = self.state();
        if state.failing_deletes.contains(entry_id) {
            return Err(DutyError::ExternalService(format!(
                "Failed to delete entry {entry_id}"
            )));
        }
        state.entries.remove(entry_id);
        Ok(())
    }

    async fn watch(&self, calendar_ref: &str) -> DutyResult<NotificationSubscription> {
        let mut state = self.state();
        if state.failing_watch {
            return Err(DutyError::ExternalService("Watch request rejected".into()));
        }

        let subscription = NotificationSubscription {
            subscription_id: state.allocate_id("channel"),
            resource_ref: format!("resource-{calendar_ref}"),
            calendar_ref: calendar_ref.to_string(),
            expires_at: Utc::now() + Duration::days(WATCH_TTL_DAYS),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn stop_watch(&self, subscription: &NotificationSubscription) -> DutyResult<()> {
        let mut state = self.state();
        state
            .subscriptions
            .retain(|s| s.subscription_id != subscription.subscription_id);
        state.stopped.push(subscription.subscription_id.clone());
        Ok(())
    }
}
