//! The fairness rules that pick a parent for a day.
//!
//! Everything here is pure: the caller supplies the recent history and the
//! per-parent counts, and gets back a decision with the rule that produced it.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::assignment::{Assignment, ParentId, Reason};
use crate::constants::{CONSECUTIVE_LIMIT, HISTORY_DEPTH, RECENT_WINDOW_DAYS};
use crate::error::{DutyError, DutyResult};

/// The two parents sharing the duty. `first` wins ties when there is no history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parents {
    first: ParentId,
    second: ParentId,
}

impl Parents {
    pub fn new(first: ParentId, second: ParentId) -> DutyResult<Self> {
        if first.as_str().trim().is_empty() || second.as_str().trim().is_empty() {
            return Err(DutyError::Validation("Parent names must not be empty".into()));
        }
        if first.as_str().eq_ignore_ascii_case(second.as_str()) {
            return Err(DutyError::Validation(format!(
                "Parents must be distinct, got '{first}' twice"
            )));
        }
        Ok(Parents { first, second })
    }

    pub fn first(&self) -> &ParentId {
        &self.first
    }

    pub fn second(&self) -> &ParentId {
        &self.second
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParentId> {
        [&self.first, &self.second].into_iter()
    }

    /// The parent that is not `parent`.
    pub fn other(&self, parent: &ParentId) -> &ParentId {
        if *parent == self.first {
            &self.second
        } else {
            &self.first
        }
    }

    /// Match free text (e.g. an entry title) against the configured names.
    pub fn resolve(&self, text: &str) -> Option<&ParentId> {
        let text = text.trim();
        self.iter().find(|p| p.as_str().eq_ignore_ascii_case(text))
    }
}

/// Weekdays on which each parent cannot take the duty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    unavailable: HashMap<ParentId, HashSet<Weekday>>,
}

impl Availability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unavailable(&mut self, parent: ParentId, weekday: Weekday) {
        self.unavailable.entry(parent).or_default().insert(weekday);
    }

    pub fn with_unavailable(mut self, parent: ParentId, weekday: Weekday) -> Self {
        self.mark_unavailable(parent, weekday);
        self
    }

    pub fn is_available(&self, parent: &ParentId, weekday: Weekday) -> bool {
        self.unavailable
            .get(parent)
            .is_none_or(|days| !days.contains(&weekday))
    }
}

/// Duty counts for one parent, over assignments strictly before a reference date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentStats {
    pub total_assignments: u32,
    pub last_30_day_assignments: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    per_parent: HashMap<ParentId, ParentStats>,
}

impl Stats {
    /// Count `assignments` dated strictly before `before`.
    pub fn before<'a>(
        assignments: impl IntoIterator<Item = &'a Assignment>,
        before: NaiveDate,
    ) -> Self {
        let recent_from = before - Duration::days(RECENT_WINDOW_DAYS);
        let mut stats = Stats::default();

        for assignment in assignments.into_iter().filter(|a| a.date < before) {
            let entry = stats.per_parent.entry(assignment.parent.clone()).or_default();
            entry.total_assignments += 1;
            if assignment.date >= recent_from {
                entry.last_30_day_assignments += 1;
            }
        }

        stats
    }

    pub fn for_parent(&self, parent: &ParentId) -> ParentStats {
        self.per_parent.get(parent).copied().unwrap_or_default()
    }

    pub fn set(&mut self, parent: ParentId, stats: ParentStats) {
        self.per_parent.insert(parent, stats);
    }
}

/// Outcome of the fairness rules for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub parent: ParentId,
    pub reason: Reason,
}

impl Decision {
    fn new(parent: &ParentId, reason: Reason) -> Self {
        Decision {
            parent: parent.clone(),
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FairnessPolicy {
    parents: Parents,
    availability: Availability,
}

impl FairnessPolicy {
    pub fn new(parents: Parents, availability: Availability) -> Self {
        FairnessPolicy {
            parents,
            availability,
        }
    }

    pub fn parents(&self) -> &Parents {
        &self.parents
    }

    /// Pick a parent for `date`.
    ///
    /// `history` holds the most recent assignments strictly before `date`,
    /// newest first; only the first [`HISTORY_DEPTH`] are considered. `stats`
    /// must also be computed strictly before `date`.
    pub fn decide(
        &self,
        date: NaiveDate,
        history: &[Assignment],
        stats: &Stats,
    ) -> DutyResult<Decision> {
        let first = self.parents.first();
        let second = self.parents.second();
        let weekday = date.weekday();

        match (
            self.availability.is_available(first, weekday),
            self.availability.is_available(second, weekday),
        ) {
            (false, false) => return Err(DutyError::NoAvailableParent { date, weekday }),
            (true, false) => return Ok(Decision::new(first, Reason::Unavailability)),
            (false, true) => return Ok(Decision::new(second, Reason::Unavailability)),
            (true, true) => {}
        }

        let history = &history[..history.len().min(HISTORY_DEPTH)];
        let first_stats = stats.for_parent(first);
        let second_stats = stats.for_parent(second);

        let Some(latest) = history.first() else {
            let parent = if second_stats.total_assignments < first_stats.total_assignments {
                second
            } else {
                first
            };
            return Ok(Decision::new(parent, Reason::TotalCountBalance));
        };

        if first_stats.total_assignments != second_stats.total_assignments {
            let parent = if first_stats.total_assignments < second_stats.total_assignments {
                first
            } else {
                second
            };
            return Ok(Decision::new(parent, Reason::TotalCountBalance));
        }

        if first_stats.last_30_day_assignments != second_stats.last_30_day_assignments {
            let parent =
                if first_stats.last_30_day_assignments < second_stats.last_30_day_assignments {
                    first
                } else {
                    second
                };
            return Ok(Decision::new(parent, Reason::RecentCountBalance));
        }

        let run = history
            .iter()
            .take_while(|a| a.parent == latest.parent)
            .count();
        let other = self.parents.other(&latest.parent);

        if run >= CONSECUTIVE_LIMIT {
            return Ok(Decision::new(other, Reason::ConsecutiveLimit));
        }

        Ok(Decision::new(other, Reason::Alternating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parents() -> Parents {
        Parents::new(ParentId::new("A"), ParentId::new("B")).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn past(parent: &str, on: NaiveDate) -> Assignment {
        Assignment::decided(
            on,
            Decision {
                parent: ParentId::new(parent),
                reason: Reason::Alternating,
            },
            Utc::now(),
        )
    }

    fn stats(a: (u32, u32), b: (u32, u32)) -> Stats {
        let mut stats = Stats::default();
        stats.set(
            ParentId::new("A"),
            ParentStats {
                total_assignments: a.0,
                last_30_day_assignments: a.1,
            },
        );
        stats.set(
            ParentId::new("B"),
            ParentStats {
                total_assignments: b.0,
                last_30_day_assignments: b.1,
            },
        );
        stats
    }

    #[test]
    fn test_no_history_ties_go_to_first_parent() {
        let policy = FairnessPolicy::new(parents(), Availability::new());

        for day in 1..=28 {
            let decision = policy
                .decide(date(2025, 2, day), &[], &Stats::default())
                .unwrap();
            assert_eq!(decision.parent, ParentId::new("A"));
            assert_eq!(decision.reason, Reason::TotalCountBalance);
        }
    }

    #[test]
    fn test_no_history_prefers_lower_total() {
        let policy = FairnessPolicy::new(parents(), Availability::new());
        let decision = policy
            .decide(date(2025, 1, 1), &[], &stats((3, 0), (1, 0)))
            .unwrap();
        assert_eq!(decision.parent, ParentId::new("B"));
        assert_eq!(decision.reason, Reason::TotalCountBalance);
    }

    #[test]
    fn test_unavailable_parent_is_skipped_regardless_of_stats() {
        // 2025-01-06 is a Monday
        let monday = date(2025, 1, 6);
        let availability = Availability::new().with_unavailable(ParentId::new("A"), Weekday::Mon);
        let policy = FairnessPolicy::new(parents(), availability);

        let history = vec![past("B", date(2025, 1, 5)), past("B", date(2025, 1, 4))];
        for s in [stats((0, 0), (9, 9)), stats((5, 1), (5, 1)), Stats::default()] {
            let decision = policy.decide(monday, &history, &s).unwrap();
            assert_eq!(decision.parent, ParentId::new("B"));
            assert_eq!(decision.reason, Reason::Unavailability);
        }
    }

    #[test]
    fn test_both_unavailable_fails() {
        let availability = Availability::new()
            .with_unavailable(ParentId::new("A"), Weekday::Sun)
            .with_unavailable(ParentId::new("B"), Weekday::Sun);
        let policy = FairnessPolicy::new(parents(), availability);

        let err = policy
            .decide(date(2025, 1, 5), &[], &Stats::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DutyError::NoAvailableParent {
                weekday: Weekday::Sun,
                ..
            }
        ));
    }

    #[test]
    fn test_recent_counts_break_total_ties() {
        let policy = FairnessPolicy::new(parents(), Availability::new());
        let history = vec![past("A", date(2025, 3, 9))];
        let decision = policy
            .decide(date(2025, 3, 10), &history, &stats((10, 4), (10, 6)))
            .unwrap();
        assert_eq!(decision.parent, ParentId::new("A"));
        assert_eq!(decision.reason, Reason::RecentCountBalance);
    }

    #[test]
    fn test_two_in_a_row_forces_the_other_parent() {
        let policy = FairnessPolicy::new(parents(), Availability::new());

        for head in ["A", "B"] {
            let history = vec![
                past(head, date(2025, 3, 9)),
                past(head, date(2025, 3, 8)),
                past("A", date(2025, 3, 7)),
            ];
            let decision = policy
                .decide(date(2025, 3, 10), &history, &stats((6, 3), (6, 3)))
                .unwrap();
            assert_ne!(decision.parent, ParentId::new(head));
            assert_eq!(decision.reason, Reason::ConsecutiveLimit);
        }
    }

    #[test]
    fn test_alternates_from_latest() {
        let policy = FairnessPolicy::new(parents(), Availability::new());
        let history = vec![past("B", date(2025, 3, 9)), past("A", date(2025, 3, 8))];
        let decision = policy
            .decide(date(2025, 3, 10), &history, &stats((4, 4), (4, 4)))
            .unwrap();
        assert_eq!(decision.parent, ParentId::new("A"));
        assert_eq!(decision.reason, Reason::Alternating);
    }

    #[test]
    fn test_five_day_sequence_from_empty_history() {
        let policy = FairnessPolicy::new(parents(), Availability::new());
        let mut assigned: Vec<Assignment> = Vec::new();

        for day in 1..=5 {
            let on = date(2025, 1, day);
            let history: Vec<Assignment> = assigned.iter().rev().cloned().collect();
            let stats = Stats::before(&assigned, on);
            let decision = policy.decide(on, &history, &stats).unwrap();
            assigned.push(Assignment::decided(on, decision, Utc::now()));
        }

        let parents: Vec<&str> = assigned.iter().map(|a| a.parent.as_str()).collect();
        let reasons: Vec<Reason> = assigned.iter().map(|a| a.reason).collect();
        assert_eq!(parents, ["A", "B", "A", "B", "A"]);
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

    #[test]
    fn test_stats_only_count_before_reference_date() {
        let assignments = vec![
            past("A", date(2024, 11, 1)),
            past("A", date(2025, 1, 2)),
            past("B", date(2025, 1, 3)),
            past("B", date(2025, 1, 10)),
        ];
        let stats = Stats::before(&assignments, date(2025, 1, 10));

        assert_eq!(
            stats.for_parent(&ParentId::new("A")),
            ParentStats {
                total_assignments: 2,
                last_30_day_assignments: 1
            }
        );
        assert_eq!(stats.for_parent(&ParentId::new("B")).total_assignments, 1);
    }

    #[test]
    fn test_parents_resolve_and_validate() {
        let parents = parents();
        assert_eq!(parents.resolve("  b "), Some(&ParentId::new("B")));
        assert_eq!(parents.resolve("Carol"), None);
        assert_eq!(parents.other(&ParentId::new("A")), &ParentId::new("B"));
        assert!(Parents::new(ParentId::new("A"), ParentId::new("a")).is_err());
    }
}
