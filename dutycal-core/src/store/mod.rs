//! Persistence contracts for assignments and subscriptions.
//!
//! The scheduling core only talks to these traits. Two backends ship with
//! the crate: [`MemoryStore`] and the TOML-backed [`FileStore`].

mod file;
mod memory;
mod state;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::assignment::Assignment;
use crate::date_range::DateRange;
use crate::error::DutyResult;
use crate::fairness::Stats;
use crate::remote::subscription::NotificationSubscription;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable, date-keyed record of who is on duty.
///
/// Implementations must keep at most one assignment per date: `upsert`
/// replaces whatever is stored for the assignment's date.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_by_date(&self, date: NaiveDate) -> DutyResult<Option<Assignment>>;

    async fn get_by_external_ref(&self, external_ref: &str) -> DutyResult<Option<Assignment>>;

    async fn upsert(&self, assignment: &Assignment) -> DutyResult<()>;

    /// Assignments inside `range`, ascending by date.
    async fn query_range(&self, range: &DateRange) -> DutyResult<Vec<Assignment>>;

    /// Per-parent counts over assignments strictly before `date`.
    async fn stats_before(&self, date: NaiveDate) -> DutyResult<Stats>;

    /// Up to `limit` assignments strictly before `date`, newest first.
    async fn recent_before(&self, date: NaiveDate, limit: usize) -> DutyResult<Vec<Assignment>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> DutyResult<Option<NotificationSubscription>>;

    async fn list_subscriptions(&self) -> DutyResult<Vec<NotificationSubscription>>;

    async fn save_subscription(&self, subscription: &NotificationSubscription) -> DutyResult<()>;

    async fn delete_subscription(&self, subscription_id: &str) -> DutyResult<()>;
}
