use anyhow::Result;
use dutycal_core::remote::protocol::DeleteEntry;

use crate::commands::client_for;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: DeleteEntry = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    client.delete_event(&params.entry_id).await?;

    Ok(serde_json::Value::Null)
}
