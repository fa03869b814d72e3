use anyhow::Result;
use dutycal_core::remote::entry::RemoteEntry;
use dutycal_core::remote::protocol::ListEntries;

use crate::commands::client_for;
use crate::convert::entry_from_google;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: ListEntries = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    let entries: Vec<RemoteEntry> = client
        .list_events(&params.query)
        .await?
        .into_iter()
        .filter_map(entry_from_google)
        // timeMin/timeMax compare instants; entries are whole days
        .filter(|e| params.query.matches(e))
        .collect();

    Ok(serde_json::to_value(entries)?)
}
