//! JSON protocol spoken between dutycal and provider binaries over stdin/stdout.
//!
//! One request line in, one response line out. Provider-specific settings
//! (calendar id, webhook address, ...) ride along flattened into the params.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::remote::entry::{EntryDraft, EntryQuery, RemoteEntry};
use crate::remote::subscription::NotificationSubscription;

pub type RemoteParams = serde_json::Map<String, serde_json::Value>;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListEntries,
    GetEntry,
    CreateEntry,
    UpdateEntry,
    DeleteEntry,
    Watch,
    StopWatch,
}

/// Request sent from dutycal to provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from provider to dutycal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> String {
        serde_json::to_string(&Response::Success { data })
            .unwrap_or_else(|e| Response::error(&format!("Failed to serialize response: {e}")))
    }
}

impl Response<()> {
    pub fn error(msg: &str) -> String {
        serde_json::json!({ "status": "error", "error": msg }).to_string()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEntries {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub query: EntryQuery,
}

impl ProviderCommand for ListEntries {
    type Response = Vec<RemoteEntry>;
    fn command() -> Command {
        Command::ListEntries
    }
}

/// Fetch one entry. A missing or deleted entry is `None`, not an error.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntry {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub entry_id: String,
}

impl ProviderCommand for GetEntry {
    type Response = Option<RemoteEntry>;
    fn command() -> Command {
        Command::GetEntry
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEntry {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub entry: EntryDraft,
}

impl ProviderCommand for CreateEntry {
    type Response = RemoteEntry;
    fn command() -> Command {
        Command::CreateEntry
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEntry {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub entry_id: String,
    pub entry: EntryDraft,
}

impl ProviderCommand for UpdateEntry {
    type Response = RemoteEntry;
    fn command() -> Command {
        Command::UpdateEntry
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEntry {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub entry_id: String,
}

impl ProviderCommand for DeleteEntry {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEntry
    }
}

/// Register for change notifications on a calendar.
#[derive(Debug, Serialize, Deserialize)]
pub struct Watch {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub calendar_ref: String,
}

impl ProviderCommand for Watch {
    type Response = NotificationSubscription;
    fn command() -> Command {
        Command::Watch
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopWatch {
    #[serde(flatten)]
    pub remote_config: RemoteParams,
    pub subscription: NotificationSubscription,
}

impl ProviderCommand for StopWatch {
    type Response = ();
    fn command() -> Command {
        Command::StopWatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_parses_as_any_type() {
        let line = Response::error("token expired");
        let parsed: Response<Vec<RemoteEntry>> = serde_json::from_str(&line).unwrap();
        assert!(matches!(parsed, Response::Error { error } if error == "token expired"));
    }

    #[test]
    fn test_unit_success_parses() {
        let line = Response::success(());
        let parsed: Response<()> = serde_json::from_str(&line).unwrap();
        assert!(matches!(parsed, Response::Success { .. }));
    }

    #[test]
    fn test_remote_config_is_flattened_into_params() {
        let mut remote_config = RemoteParams::new();
        remote_config.insert("google_calendar_id".into(), "family@group".into());

        let params = serde_json::to_value(DeleteEntry {
            remote_config,
            entry_id: "evt-7".into(),
        })
        .unwrap();

        assert_eq!(params["google_calendar_id"], "family@group");
        assert_eq!(params["entry_id"], "evt-7");
    }
}
