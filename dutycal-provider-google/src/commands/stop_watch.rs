use anyhow::Result;
use dutycal_core::remote::protocol::StopWatch;

use crate::commands::client_for;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: StopWatch = serde_json::from_value(params)?;
    let client = client_for(&params.remote_config).await?;

    let subscription = &params.subscription;
    client
        .stop_channel(&subscription.subscription_id, &subscription.resource_ref)
        .await?;

    Ok(serde_json::Value::Null)
}
