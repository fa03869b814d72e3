//! Change-notification subscriptions on the external calendar.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::notification::Notification;

/// A time-limited registration for change notifications on one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSubscription {
    pub subscription_id: String,
    pub resource_ref: String,
    pub calendar_ref: String,
    pub expires_at: DateTime<Utc>,
}

impl NotificationSubscription {
    /// True once `now` is within `window` of expiry (or past it).
    pub fn needs_renewal(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now + window >= self.expires_at
    }

    /// Both the channel and the watched resource must agree.
    pub fn matches(&self, notification: &Notification) -> bool {
        self.subscription_id == notification.subscription_id
            && self.resource_ref == notification.resource_ref
    }
}
