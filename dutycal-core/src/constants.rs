//! Tunables shared across the crate.

/// Value of the application tag stamped on every calendar entry we own.
pub const APP_TAG: &str = "dutycal";

/// How many previous assignments the fairness rules look at.
pub const HISTORY_DEPTH: usize = 5;

/// A parent never gets more than this many days in a row (absent unavailability).
pub const CONSECUTIVE_LIMIT: usize = 2;

/// Width of the "recent" window used for the second balancing rule.
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Extra days fetched on each side of the sync window.
pub const SYNC_WINDOW_PADDING_DAYS: i64 = 1;

/// Simultaneous calendar operations during a sync. Google throttles per second.
pub const DEFAULT_SYNC_CONCURRENCY: usize = 2;

/// Days regenerated after an override is applied.
pub const DEFAULT_LOOK_AHEAD_DAYS: u32 = 14;

/// Renew a watch subscription once it is this close to expiring.
pub const DEFAULT_RENEWAL_WINDOW: &str = "7days";

/// How far back to look for edited entries when a change notification arrives.
pub const DEFAULT_LOOKBACK: &str = "24h";

/// Number of days `generate`/`sync` cover when no end date is given.
pub const DEFAULT_SCHEDULE_DAYS: i64 = 28;
