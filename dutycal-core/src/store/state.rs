//! In-memory tables shared by the bundled stores.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::assignment::Assignment;
use crate::date_range::DateRange;
use crate::error::{DutyError, DutyResult};
use crate::fairness::Stats;
use crate::remote::subscription::NotificationSubscription;

#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub assignments: BTreeMap<NaiveDate, Assignment>,
    pub subscriptions: BTreeMap<String, NotificationSubscription>,
}

impl StoreState {
    pub fn by_external_ref(&self, external_ref: &str) -> Option<Assignment> {
        self.assignments
            .values()
            .find(|a| a.external_ref.as_deref() == Some(external_ref))
            .cloned()
    }

    pub fn upsert(&mut self, assignment: &Assignment) -> DutyResult<()> {
        assignment
            .validate()
            .map_err(|e| DutyError::Persistence(e.to_string()))?;
        self.assignments.insert(assignment.date, assignment.clone());
        Ok(())
    }

    pub fn range(&self, range: &DateRange) -> Vec<Assignment> {
        self.assignments
            .range(range.start()..=range.end())
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn stats_before(&self, date: NaiveDate) -> Stats {
        Stats::before(self.assignments.range(..date).map(|(_, a)| a), date)
    }

    pub fn recent_before(&self, date: NaiveDate, limit: usize) -> Vec<Assignment> {
        self.assignments
            .range(..date)
            .rev()
            .take(limit)
            .map(|(_, a)| a.clone())
            .collect()
    }
}
