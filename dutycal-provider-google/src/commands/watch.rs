use anyhow::Result;
use dutycal_core::remote::protocol::Watch;

use crate::commands::client_for;
use crate::convert::subscription_from_channel;
use crate::remote_config::GoogleRemoteConfig;

pub async fn handle(params: serde_json::Value) -> Result<serde_json::Value> {
    let params: Watch = serde_json::from_value(params)?;
    let config = GoogleRemoteConfig::from(&params.remote_config);
    let address = config.webhook_address()?;
    let client = client_for(&params.remote_config).await?;

    let channel = client.watch(&params.calendar_ref, address).await?;
    let subscription = subscription_from_channel(channel, &params.calendar_ref)?;

    Ok(serde_json::to_value(subscription)?)
}
