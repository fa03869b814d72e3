//! Google-specific remote configuration.
//!
//! dutycal-core passes its `[remote]` table through untyped; this is the
//! typed view the provider works with.

use anyhow::Result;
use dutycal_core::remote::protocol::RemoteParams;

/// Google's alias for the user's main calendar
const DEFAULT_CALENDAR_ID: &str = "primary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleRemoteConfig {
    pub google_calendar_id: String,
    /// HTTPS endpoint that receives change notifications.
    pub webhook_address: Option<String>,
}

impl GoogleRemoteConfig {
    pub fn webhook_address(&self) -> Result<&str> {
        self.webhook_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing required field: webhook_address"))
    }
}

impl From<&RemoteParams> for GoogleRemoteConfig {
    fn from(map: &RemoteParams) -> Self {
        let field = |key: &str| map.get(key).and_then(|v| v.as_str()).map(str::to_string);

        Self {
            google_calendar_id: field("google_calendar_id")
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            webhook_address: field("webhook_address"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_primary_calendar() {
        let config = GoogleRemoteConfig::from(&RemoteParams::new());
        assert_eq!(config.google_calendar_id, "primary");
        assert!(config.webhook_address().is_err());
    }

    #[test]
    fn test_reads_fields() {
        let mut map = RemoteParams::new();
        map.insert("google_calendar_id".into(), "family@group".into());
        map.insert("webhook_address".into(), "https://example.org/hook".into());

        let config = GoogleRemoteConfig::from(&map);
        assert_eq!(config.google_calendar_id, "family@group");
        assert_eq!(config.webhook_address().unwrap(), "https://example.org/hook");
    }
}
