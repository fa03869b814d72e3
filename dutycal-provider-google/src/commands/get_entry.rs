use anyhow::Result;
use dutycal_core::remote::protocol::GetEntry;

use crate::commands::client_for;
use crate::convert::entry_from_google;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: GetEntry = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    let entry = client
        .get_event(&params.entry_id)
        .await?
        .and_then(entry_from_google);

    Ok(serde_json::to_value(entry)?)
}
