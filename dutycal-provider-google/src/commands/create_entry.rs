use anyhow::{Context, Result};
use dutycal_core::remote::protocol::CreateEntry;

use crate::commands::client_for;
use crate::convert::{entry_from_google, google_from_draft};

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: CreateEntry = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    let created = client
        .insert_event(&google_from_draft(&params.entry)?)
        .await?;
    let entry = entry_from_google(created)
        .with_context(|| format!("Google returned an unusable event for {}", params.entry.date))?;

    Ok(serde_json::to_value(entry)?)
}
