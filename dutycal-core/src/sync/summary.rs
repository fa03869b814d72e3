use std::fmt;

/// What one task did for its assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Updated,
    Created { removed: usize },
    /// Creation failed; the failure itself is recorded separately.
    Failed,
    /// Cancellation was observed before the task finished.
    Abandoned,
}

/// Counts from a sync call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub updated: usize,
    pub created: usize,
    /// Stale or duplicate entries removed before creating replacements.
    pub removed: usize,
    /// Repeated assignment ids in the input that were not processed again.
    pub duplicates: usize,
}

impl SyncSummary {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::Created { removed } => {
                self.created += 1;
                self.removed += removed;
            }
            Outcome::Failed | Outcome::Abandoned => {}
        }
    }

    pub fn is_noop(&self) -> bool {
        self.updated == 0 && self.created == 0 && self.removed == 0
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} created, {} removed",
            self.updated, self.created, self.removed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut summary = SyncSummary::default();
        assert!(summary.is_noop());

        summary.record(Outcome::Updated);
        summary.record(Outcome::Created { removed: 2 });
        summary.record(Outcome::Failed);
        summary.record(Outcome::Abandoned);

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.to_string(), "1 updated, 1 created, 2 removed");
    }
}
