//! Provider subprocess protocol.
//!
//! Calendar access goes through an external binary (e.g.
//! `dutycal-provider-google`) speaking JSON over stdin/stdout, so dutycal
//! itself never holds OAuth credentials. Providers manage their own tokens.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::error::{DutyError, DutyResult};
use crate::remote::protocol::{Command, ProviderCommand, Request, Response};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn binary_path(&self) -> DutyResult<std::path::PathBuf> {
        let binary_name = format!("dutycal-provider-{}", self.0);
        which::which(&binary_name).map_err(|_| {
            DutyError::ProviderNotInstalled(format!(
                "'{}' not found in PATH. Install it with:\n  cargo install {}",
                binary_name, binary_name
            ))
        })
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> DutyResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| DutyError::ProviderTimeout(PROVIDER_TIMEOUT.as_secs()))?
    }

    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> DutyResult<R> {
        let params =
            serde_json::to_value(params).map_err(|e| DutyError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json =
            serde_json::to_string(&request).map_err(|e| DutyError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DutyError::ExternalService(format!(
                    "Failed to spawn {}: {}",
                    binary_path.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DutyError::ExternalService("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(DutyError::ExternalService(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(DutyError::ExternalService(
                "Provider returned no response".into(),
            ));
        }

        parse_response(&response_str)
    }
}

fn parse_response<R: serde::de::DeserializeOwned>(raw: &str) -> DutyResult<R> {
    let response: Response<R> = serde_json::from_str(raw.trim()).map_err(|e| {
        DutyError::ExternalService(format!("Failed to parse provider response: {e}"))
    })?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(DutyError::ExternalService(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::entry::RemoteEntry;

    #[test]
    fn test_parse_response_maps_provider_errors() {
        let err = parse_response::<()>(&Response::error("rate limited")).unwrap_err();
        assert!(matches!(err, DutyError::ExternalService(msg) if msg == "rate limited"));
    }

    #[test]
    fn test_parse_response_missing_entry() {
        let raw = r#"{"status":"success","data":null}"#;
        let entry: Option<RemoteEntry> = parse_response(raw).unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_missing_provider_binary() {
        let provider = Provider::from_name("does-not-exist-anywhere");
        assert!(matches!(
            provider.binary_path(),
            Err(DutyError::ProviderNotInstalled(_))
        ));
    }
}
