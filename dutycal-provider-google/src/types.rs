//! Push-notification channel payloads for `events.watch` and `channels.stop`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChannelRequest<'a> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub resource_id: String,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    pub expiration: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopChannelRequest<'a> {
    pub id: &'a str,
    pub resource_id: &'a str,
}
