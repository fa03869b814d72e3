//! Reconciliation of stored assignments onto the external calendar.
//!
//! Every assignment ends up with exactly one tagged entry. An entry we already
//! know about is updated in place; otherwise any leftover entries for the
//! assignment are removed and a fresh one is created.

mod summary;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assignment::{Assignment, AssignmentId};
use crate::cancel::cancellable;
use crate::constants::{APP_TAG, DEFAULT_SYNC_CONCURRENCY, SYNC_WINDOW_PADDING_DAYS};
use crate::date_range::DateRange;
use crate::error::{AggregateError, DutyError, DutyResult, SyncFailure};
use crate::remote::CalendarService;
use crate::remote::entry::{EntryDraft, EntryQuery, RemoteEntry};
use crate::store::AssignmentStore;

use summary::Outcome;
pub use summary::SyncSummary;

/// State shared by the tasks of one sync call.
#[derive(Default)]
struct Shared {
    seen: HashSet<AssignmentId>,
    failures: Vec<SyncFailure>,
}

struct TaskContext {
    store: Arc<dyn AssignmentStore>,
    calendar: Arc<dyn CalendarService>,
    /// Tagged entry ids found on the calendar, by assignment.
    index: HashMap<AssignmentId, Vec<String>>,
    shared: Mutex<Shared>,
}

impl TaskContext {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn AssignmentStore>,
    calendar: Arc<dyn CalendarService>,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn AssignmentStore>, calendar: Arc<dyn CalendarService>) -> Self {
        Reconciler {
            store,
            calendar,
            concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }

    /// Cap on assignments reconciled at the same time. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Make the calendar reflect `assignments`.
    ///
    /// Repeated assignment ids are processed once. Failed creations are
    /// collected and returned together as [`DutyError::Aggregate`] once every
    /// assignment has been attempted; update and delete failures are logged
    /// and recovered from.
    pub async fn sync(
        &self,
        assignments: &[Assignment],
        cancel: &CancellationToken,
    ) -> DutyResult<SyncSummary> {
        let Some(span) = DateRange::spanning(assignments) else {
            return Ok(SyncSummary::default());
        };

        let window = span.padded(SYNC_WINDOW_PADDING_DAYS);
        let query = EntryQuery::between(window.from_utc(), window.to_utc()).tagged(APP_TAG);
        let entries = cancellable(cancel, self.calendar.list_entries(&query)).await?;

        let context = Arc::new(TaskContext {
            store: self.store.clone(),
            calendar: self.calendar.clone(),
            index: index_entries(entries),
            shared: Mutex::new(Shared::default()),
        });
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut summary = SyncSummary::default();
        let mut tasks = Vec::with_capacity(assignments.len());

        for assignment in assignments {
            if !context.shared().seen.insert(assignment.id) {
                debug!(date = %assignment.date, id = %assignment.id, "Skipping duplicate assignment");
                summary.duplicates += 1;
                continue;
            }

            let context = context.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let owned = assignment.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Outcome::Abandoned;
                };
                reconcile_one(&context, owned, &cancel).await
            });
            tasks.push((assignment.date, assignment.id, handle));
        }

        for (date, assignment_id, handle) in tasks {
            match handle.await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => context.shared().failures.push(SyncFailure {
                    date,
                    assignment_id,
                    cause: DutyError::ExternalService(format!("Sync task failed: {e}")),
                }),
            }
        }

        if cancel.is_cancelled() {
            return Err(DutyError::Cancelled);
        }

        let failures = std::mem::take(&mut context.shared().failures);
        if !failures.is_empty() {
            return Err(AggregateError::new(failures).into());
        }

        info!(
            start = %span.start(),
            end = %span.end(),
            updated = summary.updated,
            created = summary.created,
            removed = summary.removed,
            "Synced assignments"
        );
        Ok(summary)
    }
}

fn index_entries(entries: Vec<RemoteEntry>) -> HashMap<AssignmentId, Vec<String>> {
    let mut index: HashMap<AssignmentId, Vec<String>> = HashMap::new();
    for entry in entries {
        match entry.tag() {
            Ok(Some(tag)) => index.entry(tag.assignment_id).or_default().push(entry.id),
            Ok(None) => {}
            Err(e) => warn!(entry = %entry.id, "Ignoring entry with malformed tag: {e}"),
        }
    }
    index
}

async fn reconcile_one(
    context: &TaskContext,
    mut assignment: Assignment,
    cancel: &CancellationToken,
) -> Outcome {
    if cancel.is_cancelled() {
        return Outcome::Abandoned;
    }

    let draft = EntryDraft::for_assignment(&assignment);
    let date = assignment.date;
    let attempted = assignment.external_ref.clone();
    // Entry that may still exist after a failed update; removed once its replacement exists.
    let mut unreachable = None;

    if let Some(entry_id) = attempted.as_deref() {
        match update_known(context, entry_id, &draft, cancel).await {
            Ok(true) => {
                info!(%date, entry = entry_id, parent = %assignment.parent, "Updated entry");
                return Outcome::Updated;
            }
            Ok(false) => debug!(%date, entry = entry_id, "Known entry is gone, recreating"),
            Err(e) if e.is_cancelled() => return Outcome::Abandoned,
            Err(e) => {
                warn!(%date, entry = entry_id, "Update failed, recreating: {e}");
                unreachable = Some(entry_id.to_string());
            }
        }
    }

    let stale: Vec<&str> = context
        .index
        .get(&assignment.id)
        .into_iter()
        .flatten()
        .map(String::as_str)
        .filter(|id| Some(*id) != attempted.as_deref())
        .collect();

    let Some(mut removed) = remove_entries(context, date, stale, cancel).await else {
        return Outcome::Abandoned;
    };

    let created = match cancellable(cancel, context.calendar.create_entry(&draft)).await {
        Ok(entry) => entry,
        Err(e) if e.is_cancelled() => return Outcome::Abandoned,
        Err(cause) => {
            warn!(%date, id = %assignment.id, "Failed to create entry: {cause}");
            context.shared().failures.push(SyncFailure {
                date,
                assignment_id: assignment.id,
                cause,
            });
            return Outcome::Failed;
        }
    };
    info!(%date, entry = %created.id, parent = %assignment.parent, "Created entry");

    if let Some(entry_id) = unreachable.as_deref() {
        match remove_entries(context, date, [entry_id], cancel).await {
            Some(n) => removed += n,
            None => return Outcome::Abandoned,
        }
    }

    assignment.set_external_ref(created.id.clone(), Utc::now());
    if let Err(e) = persist_external_ref(context, &assignment, cancel).await {
        warn!(%date, entry = %created.id, "Failed to record entry on assignment: {e}");
    }

    Outcome::Created { removed }
}

/// Best-effort delete of leftover entries. `None` once cancelled.
async fn remove_entries<'a>(
    context: &TaskContext,
    date: NaiveDate,
    entry_ids: impl IntoIterator<Item = &'a str>,
    cancel: &CancellationToken,
) -> Option<usize> {
    let mut removed = 0;
    for entry_id in entry_ids {
        match cancellable(cancel, context.calendar.delete_entry(entry_id)).await {
            Ok(()) => {
                debug!(%date, entry = entry_id, "Removed leftover entry");
                removed += 1;
            }
            Err(e) if e.is_cancelled() => return None,
            Err(e) => warn!(%date, entry = entry_id, "Failed to remove leftover entry: {e}"),
        }
    }
    Some(removed)
}

/// `Ok(false)` when the entry no longer exists.
async fn update_known(
    context: &TaskContext,
    entry_id: &str,
    draft: &EntryDraft,
    cancel: &CancellationToken,
) -> DutyResult<bool> {
    if cancellable(cancel, context.calendar.get_entry(entry_id))
        .await?
        .is_none()
    {
        return Ok(false);
    }
    cancellable(cancel, context.calendar.update_entry(entry_id, draft)).await?;
    Ok(true)
}

/// Store the new entry id, unless the date has been reassigned meanwhile.
async fn persist_external_ref(
    context: &TaskContext,
    assignment: &Assignment,
    cancel: &CancellationToken,
) -> DutyResult<()> {
    let current = cancellable(cancel, context.store.get_by_date(assignment.date)).await?;
    let Some(mut current) = current.filter(|c| c.id == assignment.id) else {
        debug!(date = %assignment.date, "Assignment changed during sync, not recording entry");
        return Ok(());
    };

    if let Some(entry_id) = &assignment.external_ref {
        current.set_external_ref(entry_id.clone(), assignment.updated_at);
    }
    cancellable(cancel, context.store.upsert(&current)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{ParentId, Reason};
    use crate::fairness::Decision;
    use crate::remote::MemoryCalendar;
    use crate::store::MemoryStore;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn assignment(parent: &str, on: NaiveDate) -> Assignment {
        Assignment::decided(
            on,
            Decision {
                parent: ParentId::new(parent),
                reason: Reason::Alternating,
            },
            Utc::now(),
        )
    }

    async fn setup(
        assignments: &[Assignment],
    ) -> (Arc<MemoryStore>, Arc<MemoryCalendar>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        for a in assignments {
            store.upsert(a).await.unwrap();
        }
        let calendar = Arc::new(MemoryCalendar::new());
        let reconciler = Reconciler::new(store.clone(), calendar.clone());
        (store, calendar, reconciler)
    }

    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let (_, calendar, reconciler) = setup(&[]).await;
        let summary = reconciler
            .sync(&[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(summary.is_noop());
        assert!(calendar.entries().is_empty());
    }

    #[tokio::test]
    async fn test_creates_then_updates_in_place() {
        let first = assignment("A", date(1));
        let (store, calendar, reconciler) = setup(std::slice::from_ref(&first)).await;
        let cancel = CancellationToken::new();

        let summary = reconciler.sync(&[first.clone()], &cancel).await.unwrap();
        assert_eq!(summary.created, 1);

        let stored = store.get_by_date(date(1)).await.unwrap().unwrap();
        let entry_id = stored.external_ref.clone().unwrap();
        assert_eq!(calendar.entry(&entry_id).unwrap().title, "A");

        let summary = reconciler.sync(&[stored], &cancel).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(calendar.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_in_input_are_processed_once() {
        let a = assignment("A", date(1));
        let (_, calendar, reconciler) = setup(std::slice::from_ref(&a)).await;

        let summary = reconciler
            .sync(&[a.clone(), a.clone(), a.clone()], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(calendar.entries_for(a.id).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_clamped() {
        let (store, calendar, _) = setup(&[]).await;
        let reconciler = Reconciler::new(store, calendar).with_concurrency(0);
        assert_eq!(reconciler.concurrency, 1);
    }

    #[tokio::test]
    async fn test_cancelled_sync_reports_cancellation() {
        let a = assignment("A", date(1));
        let (_, calendar, reconciler) = setup(std::slice::from_ref(&a)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reconciler.sync(&[a], &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(calendar.entries().is_empty());
    }
}
