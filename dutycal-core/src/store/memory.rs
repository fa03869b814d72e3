use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::assignment::Assignment;
use crate::date_range::DateRange;
use crate::error::DutyResult;
use crate::fairness::Stats;
use crate::remote::subscription::NotificationSubscription;
use crate::store::state::StoreState;
use crate::store::{AssignmentStore, SubscriptionStore};

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored assignment, ascending by date.
    pub fn assignments(&self) -> Vec<Assignment> {
        self.read().assignments.values().cloned().collect()
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn get_by_date(&self, date: NaiveDate) -> DutyResult<Option<Assignment>> {
        Ok(self.read().assignments.get(&date).cloned())
    }

    async fn get_by_external_ref(&self, external_ref: &str) -> DutyResult<Option<Assignment>> {
        Ok(self.read().by_external_ref(external_ref))
    }

    async fn upsert(&self, assignment: &Assignment) -> DutyResult<()> {
        self.write().upsert(assignment)
    }

    async fn query_range(&self, range: &DateRange) -> DutyResult<Vec<Assignment>> {
        Ok(self.read().range(range))
    }

    async fn stats_before(&self, date: NaiveDate) -> DutyResult<Stats> {
        Ok(self.read().stats_before(date))
    }

    async fn recent_before(&self, date: NaiveDate, limit: usize) -> DutyResult<Vec<Assignment>> {
        Ok(self.read().recent_before(date, limit))
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> DutyResult<Option<NotificationSubscription>> {
        Ok(self.read().subscriptions.get(subscription_id).cloned())
    }

    async fn list_subscriptions(&self) -> DutyResult<Vec<NotificationSubscription>> {
        Ok(self.read().subscriptions.values().cloned().collect())
    }

    async fn save_subscription(&self, subscription: &NotificationSubscription) -> DutyResult<()> {
        self.write()
            .subscriptions
            .insert(subscription.subscription_id.clone(), subscription.clone());
        Ok(())
    }

    async fn delete_subscription(&self, subscription_id: &str) -> DutyResult<()> {
        self.write().subscriptions.remove(subscription_id);
        Ok(())
    }
}
