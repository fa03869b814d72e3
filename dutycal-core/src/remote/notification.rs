//! Change notifications delivered by the calendar service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DutyError, DutyResult};

const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
const RESOURCE_ID_HEADER: &str = "x-goog-resource-id";
const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

/// What the notification says happened to the watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Handshake sent right after a watch is created. Carries no change.
    Sync,
    Exists,
    NotExists,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceState::Sync => "sync",
            ResourceState::Exists => "exists",
            ResourceState::NotExists => "not_exists",
        })
    }
}

impl FromStr for ResourceState {
    type Err = DutyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sync" => Ok(ResourceState::Sync),
            "exists" => Ok(ResourceState::Exists),
            "not_exists" => Ok(ResourceState::NotExists),
            other => Err(DutyError::Validation(format!(
                "Unknown resource state '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subscription_id: String,
    pub resource_ref: String,
    pub state: ResourceState,
}

impl Notification {
    /// Build from webhook headers. Header names are matched case-insensitively.
    pub fn from_headers<'a>(
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> DutyResult<Self> {
        let mut subscription_id = None;
        let mut resource_ref = None;
        let mut state = None;

        for (name, value) in headers {
            match name.to_ascii_lowercase().as_str() {
                CHANNEL_ID_HEADER => subscription_id = Some(value.to_string()),
                RESOURCE_ID_HEADER => resource_ref = Some(value.to_string()),
                RESOURCE_STATE_HEADER => state = Some(value.parse()?),
                _ => {}
            }
        }

        let missing = |header: &str| DutyError::Validation(format!("Missing {header} header"));

        Ok(Notification {
            subscription_id: subscription_id.ok_or_else(|| missing(CHANNEL_ID_HEADER))?,
            resource_ref: resource_ref.ok_or_else(|| missing(RESOURCE_ID_HEADER))?,
            state: state.ok_or_else(|| missing(RESOURCE_STATE_HEADER))?,
        })
    }

    pub fn is_handshake(&self) -> bool {
        self.state == ResourceState::Sync
    }
}
