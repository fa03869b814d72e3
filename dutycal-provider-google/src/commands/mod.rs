pub mod create_entry;
pub mod delete_entry;
pub mod get_entry;
pub mod list_entries;
pub mod stop_watch;
pub mod update_entry;
pub mod watch;

use anyhow::Result;
use dutycal_core::remote::protocol::{Command, RemoteParams};

use crate::google::GoogleClient;
use crate::remote_config::GoogleRemoteConfig;

pub async fn dispatch(command: Command, params: serde_json::Value) -> Result<serde_json::Value> {
    match command {
        Command::ListEntries => list_entries::handle(params).await,
        Command::GetEntry => get_entry::handle(params).await,
        Command::CreateEntry => create_entry::handle(params).await,
        Command::UpdateEntry => update_entry::handle(params).await,
        Command::DeleteEntry => delete_entry::handle(params).await,
        Command::Watch => watch::handle(params).await,
        Command::StopWatch => stop_watch::handle(params).await,
    }
}

/// Client for the calendar named in the request's remote config.
pub async fn client_for(remote_config: &RemoteParams) -> Result<GoogleClient> {
    let config = GoogleRemoteConfig::from(remote_config);
    GoogleClient::connect(&config.google_calendar_id).await
}
