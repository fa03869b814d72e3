use anyhow::{Context, Result};
use dutycal_core::remote::protocol::UpdateEntry;

use crate::commands::client_for;
use crate::convert::{entry_from_google, google_from_draft};

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: UpdateEntry = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    let updated = client
        .update_event(&params.entry_id, &google_from_draft(&params.entry)?)
        .await?;
    let entry = entry_from_google(updated)
        .with_context(|| format!("Event {} is no longer usable", params.entry_id))?;

    Ok(serde_json::to_value(entry)?)
}
