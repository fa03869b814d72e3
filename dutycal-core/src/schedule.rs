//! Turning a date range into stored assignments.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assignment::Assignment;
use crate::cancel::cancellable;
use crate::constants::HISTORY_DEPTH;
use crate::date_range::DateRange;
use crate::error::{DutyError, DutyResult};
use crate::fairness::FairnessPolicy;
use crate::store::AssignmentStore;

/// Fills a date range with assignments, oldest date first.
///
/// A date that already has an assignment is never re-decided, so running the
/// generator twice over the same range yields the same records.
#[derive(Clone)]
pub struct ScheduleGenerator {
    store: Arc<dyn AssignmentStore>,
    policy: Arc<FairnessPolicy>,
}

impl ScheduleGenerator {
    pub fn new(store: Arc<dyn AssignmentStore>, policy: Arc<FairnessPolicy>) -> Self {
        ScheduleGenerator { store, policy }
    }

    /// Return one assignment per date in `range`, deciding and storing the
    /// missing ones.
    ///
    /// Each date sees the decisions made for earlier dates in the same call.
    /// On failure, assignments already stored for earlier dates stay stored.
    pub async fn generate(
        &self,
        range: &DateRange,
        cancel: &CancellationToken,
    ) -> DutyResult<Vec<Assignment>> {
        let mut assignments = Vec::with_capacity(range.num_days());
        let mut decided = 0usize;

        for date in range.days() {
            if cancel.is_cancelled() {
                return Err(DutyError::Cancelled);
            }

            let existing = cancellable(cancel, self.store.get_by_date(date))
                .await
                .map_err(|e| e.at_date(date))?;
            if let Some(existing) = existing {
                debug!(%date, parent = %existing.parent, "Keeping existing assignment");
                assignments.push(existing);
                continue;
            }

            let assignment = self.decide(date, cancel).await.map_err(|e| e.at_date(date))?;
            debug!(
                %date,
                parent = %assignment.parent,
                reason = %assignment.reason,
                "Decided assignment"
            );
            decided += 1;
            assignments.push(assignment);
        }

        info!(
            start = %range.start(),
            end = %range.end(),
            decided,
            kept = assignments.len() - decided,
            "Generated schedule"
        );

        Ok(assignments)
    }

    async fn decide(
        &self,
        date: chrono::NaiveDate,
        cancel: &CancellationToken,
    ) -> DutyResult<Assignment> {
        let history = cancellable(cancel, self.store.recent_before(date, HISTORY_DEPTH)).await?;
        let stats = cancellable(cancel, self.store.stats_before(date)).await?;
        let decision = self.policy.decide(date, &history, &stats)?;

        let assignment = Assignment::decided(date, decision, Utc::now());
        cancellable(cancel, self.store.upsert(&assignment)).await?;
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{ParentId, Reason};
    use crate::fairness::{Availability, Parents};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, Weekday};

    fn date(d: u32) -> NaiveDate {
        // 2025-09-01 is a Monday
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn generator(availability: Availability) -> (Arc<MemoryStore>, ScheduleGenerator) {
        let store = Arc::new(MemoryStore::new());
        let parents = Parents::new(ParentId::new("A"), ParentId::new("B")).unwrap();
        let policy = Arc::new(FairnessPolicy::new(parents, availability));
        (store.clone(), ScheduleGenerator::new(store, policy))
    }

    #[tokio::test]
    async fn test_generate_fresh_week_alternates() {
        let (_, generator) = generator(Availability::new());
        let range = DateRange::new(date(1), date(5)).unwrap();

        let assignments = generator
            .generate(&range, &CancellationToken::new())
            .await
            .unwrap();

        let parents: Vec<_> = assignments.iter().map(|a| a.parent.as_str()).collect();
        assert_eq!(parents, ["A", "B", "A", "B", "A"]);
        let reasons: Vec<_> = assignments.iter().map(|a| a.reason).collect();
        assert_eq!(
            reasons,
            [
                Reason::TotalCountBalance,
                Reason::TotalCountBalance,
                Reason::Alternating,
                Reason::TotalCountBalance,
                Reason::Alternating,
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_twice_returns_same_records() {
        let (_, generator) = generator(Availability::new());
        let range = DateRange::new(date(1), date(10)).unwrap();
        let cancel = CancellationToken::new();

        let first = generator.generate(&range, &cancel).await.unwrap();
        let second = generator.generate(&range, &cancel).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_override_is_never_redecided() {
        let (store, generator) = generator(Availability::new());
        let cancel = CancellationToken::new();

        let mut pinned = generator
            .generate(&DateRange::single(date(3)), &cancel)
            .await
            .unwrap()
            .remove(0);
        pinned.apply_override(ParentId::new("B"), Utc::now());
        store.upsert(&pinned).await.unwrap();

        let assignments = generator
            .generate(&DateRange::new(date(1), date(5)).unwrap(), &cancel)
            .await
            .unwrap();
        let day3 = assignments.iter().find(|a| a.date == date(3)).unwrap();
        assert_eq!(day3, &pinned);
    }

    #[tokio::test]
    async fn test_no_available_parent_keeps_earlier_days() {
        let availability = Availability::new()
            .with_unavailable(ParentId::new("A"), Weekday::Wed)
            .with_unavailable(ParentId::new("B"), Weekday::Wed);
        let (store, generator) = generator(availability);
        let range = DateRange::new(date(1), date(5)).unwrap();

        let err = generator
            .generate(&range, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            DutyError::NoAvailableParent { weekday: Weekday::Wed, .. }
        ));
        assert!(err.to_string().starts_with("2025-09-03"));
        let stored: Vec<_> = store.assignments().iter().map(|a| a.date).collect();
        assert_eq!(stored, [date(1), date(2)]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let (store, generator) = generator(Availability::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = generator
            .generate(&DateRange::single(date(1)), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.assignments().is_empty());
    }
}
