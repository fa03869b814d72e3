//! Turning edits made on the external calendar into overrides.
//!
//! When someone renames one of our entries to the other parent, the change
//! notification lands here. The assignment for that day is pinned to the new
//! parent and the days after it are regenerated and synced, since the fairness
//! rules now see a different history.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::cancellable;
use crate::constants::{APP_TAG, DEFAULT_LOOK_AHEAD_DAYS, DEFAULT_SYNC_CONCURRENCY};
use crate::date_range::DateRange;
use crate::error::{DutyError, DutyResult};
use crate::fairness::FairnessPolicy;
use crate::remote::entry::{EntryQuery, RemoteEntry};
use crate::remote::subscription::NotificationSubscription;
use crate::remote::{CalendarService, Notification};
use crate::schedule::ScheduleGenerator;
use crate::store::{AssignmentStore, SubscriptionStore};
use crate::sync::Reconciler;

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Days after an overridden date that get regenerated and synced.
    pub look_ahead_days: u32,
    /// Renew a subscription once it is this close to expiring.
    pub renewal_window: Duration,
    /// How far back to look for edited entries.
    pub lookback: Duration,
    /// Defines "today" when rejecting edits to past days.
    pub timezone: Tz,
    pub sync_concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            look_ahead_days: DEFAULT_LOOK_AHEAD_DAYS,
            renewal_window: Duration::days(7),
            lookback: Duration::hours(24),
            timezone: Tz::UTC,
            sync_concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }
}

/// What happened while handling one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// The notification was the initial handshake; nothing was read.
    pub acknowledged: bool,
    /// Id of the replacement subscription, if one was created.
    pub renewed: Option<String>,
    /// Dates that became overrides.
    pub applied: Vec<NaiveDate>,
    pub skipped: usize,
    pub failed: usize,
}

enum EntryOutcome {
    Applied(NaiveDate),
    Skipped,
}

pub struct OverrideIngestor {
    store: Arc<dyn AssignmentStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    calendar: Arc<dyn CalendarService>,
    policy: Arc<FairnessPolicy>,
    generator: ScheduleGenerator,
    reconciler: Reconciler,
    settings: IngestSettings,
}

impl OverrideIngestor {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        calendar: Arc<dyn CalendarService>,
        policy: Arc<FairnessPolicy>,
        settings: IngestSettings,
    ) -> Self {
        let generator = ScheduleGenerator::new(store.clone(), policy.clone());
        let reconciler = Reconciler::new(store.clone(), calendar.clone())
            .with_concurrency(settings.sync_concurrency);

        OverrideIngestor {
            store,
            subscriptions,
            calendar,
            policy,
            generator,
            reconciler,
            settings,
        }
    }

    /// Register for change notifications on `calendar_ref` and remember the
    /// subscription.
    pub async fn start_watch(
        &self,
        calendar_ref: &str,
        cancel: &CancellationToken,
    ) -> DutyResult<NotificationSubscription> {
        let subscription = cancellable(cancel, self.calendar.watch(calendar_ref)).await?;
        cancellable(cancel, self.subscriptions.save_subscription(&subscription)).await?;

        info!(
            subscription = %subscription.subscription_id,
            calendar = calendar_ref,
            expires_at = %subscription.expires_at,
            "Started watching calendar"
        );
        Ok(subscription)
    }

    pub async fn stop_watch(
        &self,
        subscription_id: &str,
        cancel: &CancellationToken,
    ) -> DutyResult<()> {
        let subscription = cancellable(cancel, self.subscriptions.get_subscription(subscription_id))
            .await?
            .ok_or_else(|| DutyError::NotFound(format!("subscription {subscription_id}")))?;

        cancellable(cancel, self.calendar.stop_watch(&subscription)).await?;
        cancellable(cancel, self.subscriptions.delete_subscription(subscription_id)).await?;

        info!(subscription = subscription_id, "Stopped watching calendar");
        Ok(())
    }

    pub async fn handle_external_change(
        &self,
        notification: &Notification,
        cancel: &CancellationToken,
    ) -> DutyResult<IngestReport> {
        self.handle_at(notification, Utc::now(), cancel).await
    }

    /// Handle a notification as if it arrived at `now`.
    pub async fn handle_at(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> DutyResult<IngestReport> {
        let subscription = cancellable(
            cancel,
            self.subscriptions
                .get_subscription(&notification.subscription_id),
        )
        .await?
        .filter(|s| s.matches(notification))
        .ok_or_else(|| {
            DutyError::InvalidSubscription(format!(
                "no subscription {} for resource {}",
                notification.subscription_id, notification.resource_ref
            ))
        })?;

        let mut report = IngestReport::default();

        if subscription.needs_renewal(now, self.settings.renewal_window) {
            match self.renew(&subscription, cancel).await {
                Ok(renewed) => report.renewed = Some(renewed.subscription_id),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => warn!(
                    subscription = %subscription.subscription_id,
                    "Failed to renew subscription: {e}"
                ),
            }
        }

        if notification.is_handshake() {
            debug!(subscription = %subscription.subscription_id, "Acknowledged handshake");
            report.acknowledged = true;
            return Ok(report);
        }

        let query = EntryQuery::updated_since(now - self.settings.lookback).tagged(APP_TAG);
        let entries = cancellable(cancel, self.calendar.list_entries(&query)).await?;
        let today = now.with_timezone(&self.settings.timezone).date_naive();

        for entry in &entries {
            match self.apply_entry(entry, today, cancel).await {
                Ok(EntryOutcome::Applied(date)) => report.applied.push(date),
                Ok(EntryOutcome::Skipped) => report.skipped += 1,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(entry = %entry.id, "Failed to apply calendar edit: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            failed = report.failed,
            "Processed calendar changes"
        );
        Ok(report)
    }

    /// Replace `old` with a fresh subscription on the same calendar.
    async fn renew(
        &self,
        old: &NotificationSubscription,
        cancel: &CancellationToken,
    ) -> DutyResult<NotificationSubscription> {
        let renewed = cancellable(cancel, self.calendar.watch(&old.calendar_ref)).await?;
        cancellable(cancel, self.subscriptions.save_subscription(&renewed)).await?;

        if let Err(e) = cancellable(cancel, self.calendar.stop_watch(old)).await {
            warn!(subscription = %old.subscription_id, "Failed to stop old subscription: {e}");
        }
        cancellable(cancel, self.subscriptions.delete_subscription(&old.subscription_id)).await?;

        info!(
            old = %old.subscription_id,
            new = %renewed.subscription_id,
            expires_at = %renewed.expires_at,
            "Renewed subscription"
        );
        Ok(renewed)
    }

    async fn apply_entry(
        &self,
        entry: &RemoteEntry,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> DutyResult<EntryOutcome> {
        let Some(parent) = self.policy.parents().resolve(&entry.title) else {
            debug!(entry = %entry.id, title = %entry.title, "Title names no known parent");
            return Ok(EntryOutcome::Skipped);
        };

        let Some(mut assignment) =
            cancellable(cancel, self.store.get_by_external_ref(&entry.id)).await?
        else {
            debug!(entry = %entry.id, "No assignment tracks this entry");
            return Ok(EntryOutcome::Skipped);
        };

        if &assignment.parent == parent {
            return Ok(EntryOutcome::Skipped);
        }

        let date = assignment.date;
        if date < today {
            info!(%date, entry = %entry.id, "Ignoring edit to a past day");
            return Ok(EntryOutcome::Skipped);
        }

        assignment.apply_override(parent.clone(), Utc::now());
        cancellable(cancel, self.store.upsert(&assignment))
            .await
            .map_err(|e| e.at_date(date))?;
        info!(%date, parent = %assignment.parent, "Applied override from calendar");

        let range = DateRange::new(
            date,
            date + Duration::days(i64::from(self.settings.look_ahead_days)),
        )?;
        let regenerated = self.generator.generate(&range, cancel).await?;
        self.reconciler.sync(&regenerated, cancel).await?;

        Ok(EntryOutcome::Applied(date))
    }
}
