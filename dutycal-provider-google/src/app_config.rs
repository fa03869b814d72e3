//! App-level configuration for the Google provider.
//!
//! User-provided OAuth credentials stored at:
//!   ~/.config/dutycal/providers/google/app_config.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Google OAuth client credentials (user-provided), needed to refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
}

pub fn base_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join("dutycal")
        .join("providers")
        .join("google"))
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = base_dir()?.join("app_config.toml");

        if !path.exists() {
            anyhow::bail!(
                "Google credentials not found.\n\n\
                Create {} with:\n\n\
                client_id = \"your-client-id.apps.googleusercontent.com\"\n\
                client_secret = \"your-client-secret\"\n\n\
                See https://console.cloud.google.com/apis/credentials for setup.",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {}", path.display()))
    }
}
