//! The external calendar, as dutycal sees it.

pub mod entry;
pub mod memory;
pub mod notification;
pub mod protocol;
pub mod provider;
pub mod subscription;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DutyResult;
use crate::remote::entry::{EntryDraft, EntryQuery, RemoteEntry};
use crate::remote::protocol::{
    CreateEntry, DeleteEntry, GetEntry, ListEntries, RemoteParams, StopWatch, UpdateEntry, Watch,
};
use crate::remote::provider::Provider;
use crate::remote::subscription::NotificationSubscription;

pub use entry::{EntryTag, PROP_APP, PROP_ASSIGNMENT_ID, PROP_PARENT, PROP_UPDATED_AT};
pub use memory::MemoryCalendar;
pub use notification::{Notification, ResourceState};

/// Google's alias for the user's main calendar.
const DEFAULT_CALENDAR_REF: &str = "primary";

/// Operations dutycal needs from a calendar service.
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_entries(&self, query: &EntryQuery) -> DutyResult<Vec<RemoteEntry>>;

    /// `Ok(None)` when the entry no longer exists.
    async fn get_entry(&self, entry_id: &str) -> DutyResult<Option<RemoteEntry>>;

    async fn create_entry(&self, draft: &EntryDraft) -> DutyResult<RemoteEntry>;

    async fn update_entry(&self, entry_id: &str, draft: &EntryDraft) -> DutyResult<RemoteEntry>;

    async fn delete_entry(&self, entry_id: &str) -> DutyResult<()>;

    async fn watch(&self, calendar_ref: &str) -> DutyResult<NotificationSubscription>;

    async fn stop_watch(&self, subscription: &NotificationSubscription) -> DutyResult<()>;
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RemoteConfig(pub HashMap<String, toml::Value>);

impl From<&RemoteConfig> for RemoteParams {
    fn from(config: &RemoteConfig) -> Self {
        config
            .0
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

/// A calendar reached through a provider binary (e.g. Google Calendar).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Remote {
    pub provider: Provider,
    #[serde(flatten)]
    pub config: RemoteConfig,
}

impl Remote {
    fn remote_config(&self) -> RemoteParams {
        RemoteParams::from(&self.config)
    }

    pub fn new(provider: Provider, config: RemoteConfig) -> Self {
        Remote { provider, config }
    }

    /// The calendar this remote points at.
    ///
    /// Looks for a `{provider}_calendar_id` field in the config (e.g.
    /// `google_calendar_id`), falling back to the primary calendar.
    pub fn calendar_ref(&self) -> String {
        let key = format!("{}_calendar_id", self.provider.name());
        self.config
            .0
            .get(&key)
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_CALENDAR_REF)
            .to_string()
    }
}

#[async_trait]
impl CalendarService for Remote {
    async fn list_entries(&self, query: &EntryQuery) -> DutyResult<Vec<RemoteEntry>> {
        self.provider
            .call(ListEntries {
                remote_config: self.remote_config(),
                query: query.clone(),
            })
            .await
    }

    async fn get_entry(&self, entry_id: &str) -> DutyResult<Option<RemoteEntry>> {
        self.provider
            .call(GetEntry {
                remote_config: self.remote_config(),
                entry_id: entry_id.to_string(),
            })
            .await
    }

    async fn create_entry(&self, draft: &EntryDraft) -> DutyResult<RemoteEntry> {
        self.provider
            .call(CreateEntry {
                remote_config: self.remote_config(),
                entry: draft.clone(),
            })
            .await
    }

    async fn update_entry(&self, entry_id: &str, draft: &EntryDraft) -> DutyResult<RemoteEntry> {
        self.provider
            .call(UpdateEntry {
                remote_config: self.remote_config(),
                entry_id: entry_id.to_string(),
                entry: draft.clone(),
            })
            .await
    }

    async fn delete_entry(&self, entry_id: &str) -> DutyResult<()> {
        self.provider
            .call(DeleteEntry {
                remote_config: self.remote_config(),
                entry_id: entry_id.to_string(),
            })
            .await
    }

    async fn watch(&self, calendar_ref: &str) -> DutyResult<NotificationSubscription> {
        self.provider
            .call(Watch {
                remote_config: self.remote_config(),
                calendar_ref: calendar_ref.to_string(),
            })
            .await
    }

    async fn stop_watch(&self, subscription: &NotificationSubscription) -> DutyResult<()> {
        self.provider
            .call(StopWatch {
                remote_config: self.remote_config(),
                subscription: subscription.clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_from_toml() {
        let remote: Remote = toml::from_str(
            r#"
            provider = "google"
            google_calendar_id = "family@group.calendar.google.com"
            webhook_address = "https://example.org/hooks/calendar"
            "#,
        )
        .unwrap();

        assert_eq!(remote.provider.name(), "google");
        assert_eq!(remote.calendar_ref(), "family@group.calendar.google.com");
        assert_eq!(
            remote.remote_config()["webhook_address"],
            "https://example.org/hooks/calendar"
        );
    }

    #[test]
    fn test_calendar_ref_defaults_to_primary() {
        let remote = Remote::new(Provider::from_name("google"), RemoteConfig::default());
        assert_eq!(remote.calendar_ref(), "primary");
    }
}
