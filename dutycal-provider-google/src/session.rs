//! Access token for the Google Calendar API.
//!
//! Tokens are acquired outside dutycal. They are read from
//! `DUTYCAL_GOOGLE_ACCESS_TOKEN` when set, otherwise from
//! `~/.config/dutycal/providers/google/session.toml`, which is refreshed in
//! place once expired.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_config::{AppConfig, base_dir};

const TOKEN_ENV: &str = "DUTYCAL_GOOGLE_ACCESS_TOKEN";

/// Refresh slightly early so a token does not expire mid-request.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Serialize, Deserialize, Clone)]
pub struct SessionData {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

pub enum Session {
    /// Token handed in through the environment; never refreshed.
    Env(String),
    File(SessionData),
}

impl Session {
    fn path() -> Result<std::path::PathBuf> {
        Ok(base_dir()?.join("session.toml"))
    }

    /// Load a session and refresh it if expired.
    pub async fn load_valid() -> Result<Self> {
        let mut session = Self::load()?;
        if session.is_expired(Utc::now()) {
            session.refresh().await?;
        }
        Ok(session)
    }

    fn load() -> Result<Self> {
        if let Some(token) = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
        {
            return Ok(Session::Env(token.trim().to_string()));
        }

        let path = Self::path()?;

        if !path.exists() {
            anyhow::bail!(
                "No Google access token. Set {TOKEN_ENV} or write one to {}",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read Google session from {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse Google session from {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(Session::File(toml::from_str(contents)?))
    }

    pub fn access_token(&self) -> &str {
        match self {
            Session::Env(token) => token,
            Session::File(data) => &data.access_token,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Session::Env(_) => false,
            Session::File(data) => data
                .expires_at
                .is_some_and(|at| now + Duration::seconds(EXPIRY_MARGIN_SECS) >= at),
        }
    }

    fn save(data: &SessionData) -> Result<()> {
        let contents = toml::to_string_pretty(data).context("Failed to serialize session")?;
        let path = Self::path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;

        // Set to owner-only (0600) since file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let Session::File(data) = self else {
            return Ok(());
        };
        let refresh_token = data
            .refresh_token
            .clone()
            .context("Google session expired and has no refresh token")?;
        let app_config = AppConfig::load()?;

        debug!("Refreshing Google access token");

        let client = google_calendar::Client::new(
            app_config.client_id,
            app_config.client_secret,
            String::new(),
            data.access_token.clone(),
            refresh_token,
        );
        let refreshed = client
            .refresh_access_token()
            .await
            .context("Failed to refresh Google token")?;

        data.access_token = refreshed.access_token;
        data.expires_at = if refreshed.expires_in > 0 {
            Some(Utc::now() + Duration::seconds(refreshed.expires_in))
        } else {
            None
        };
        // Google typically doesn't return a new refresh_token on refresh
        if !refreshed.refresh_token.is_empty() {
            data.refresh_token = Some(refreshed.refresh_token);
        }

        Self::save(data)
    }
}
