//! dutycal configuration at ~/.config/dutycal/config.toml
//!
//! Values can be overridden from the environment with a `DUTYCAL_` prefix,
//! using `__` to reach into tables (e.g. `DUTYCAL_REMOTE__GOOGLE_CALENDAR_ID`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Weekday;
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::assignment::ParentId;
use crate::constants::{
    DEFAULT_LOOK_AHEAD_DAYS, DEFAULT_LOOKBACK, DEFAULT_RENEWAL_WINDOW, DEFAULT_SYNC_CONCURRENCY,
};
use crate::error::{DutyError, DutyResult};
use crate::fairness::{Availability, FairnessPolicy, Parents};
use crate::ingest::IngestSettings;
use crate::remote::Remote;

static DEFAULT_DATA_DIR: &str = "~/.local/share/dutycal";
static STATE_FILE: &str = "state.toml";
static ENV_PREFIX: &str = "DUTYCAL";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_look_ahead_days() -> u32 {
    DEFAULT_LOOK_AHEAD_DAYS
}

fn default_renewal_window() -> String {
    DEFAULT_RENEWAL_WINDOW.to_string()
}

fn default_lookback() -> String {
    DEFAULT_LOOKBACK.to_string()
}

fn default_sync_concurrency() -> usize {
    DEFAULT_SYNC_CONCURRENCY
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParentsConfig {
    /// Wins every tie.
    pub first: String,
    pub second: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DutyConfig {
    pub parents: ParentsConfig,

    /// Parent name to weekdays they cannot take, e.g. `Alex = ["Mon", "Thu"]`.
    #[serde(default)]
    pub unavailable: HashMap<String, Vec<String>>,

    #[serde(default = "default_look_ahead_days")]
    pub look_ahead_days: u32,

    #[serde(default = "default_renewal_window")]
    pub renewal_window: String,

    #[serde(default = "default_lookback")]
    pub lookback: String,

    #[serde(default = "default_sync_concurrency")]
    pub sync_concurrency: usize,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub remote: Option<Remote>,
}

impl DutyConfig {
    pub fn config_path() -> DutyResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DutyError::Config("Could not determine config directory".into()))?
            .join("dutycal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, writing a commented template first if
    /// there is no config file yet.
    pub fn load() -> DutyResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> DutyResult<Self> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment(None));

        Self::build(builder).map_err(|e| match e {
            DutyError::Config(msg) => {
                DutyError::Config(format!("{msg} (in {})", path.display()))
            }
            other => other,
        })
    }

    /// Parse a config from TOML text, without the environment layer.
    pub fn from_toml(content: &str) -> DutyResult<Self> {
        Self::build(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> DutyResult<Self> {
        let config: DutyConfig = builder
            .build()
            .map_err(|e| DutyError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| DutyError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check everything that serde cannot: names, weekdays, durations, timezone.
    pub fn validate(&self) -> DutyResult<()> {
        self.availability()?;
        self.ingest_settings()?;
        if self.look_ahead_days == 0 {
            return Err(DutyError::Config("look_ahead_days must be at least 1".into()));
        }
        Ok(())
    }

    pub fn parents(&self) -> DutyResult<Parents> {
        Parents::new(
            ParentId::new(self.parents.first.trim()),
            ParentId::new(self.parents.second.trim()),
        )
        .map_err(|e| DutyError::Config(e.to_string()))
    }

    pub fn availability(&self) -> DutyResult<Availability> {
        let parents = self.parents()?;
        let mut availability = Availability::new();

        for (name, days) in &self.unavailable {
            let parent = parents.resolve(name).ok_or_else(|| {
                DutyError::Config(format!(
                    "unavailable.{name} does not name a configured parent"
                ))
            })?;

            for day in days {
                let weekday: Weekday = day.trim().parse().map_err(|_| {
                    DutyError::Config(format!("unavailable.{name}: '{day}' is not a weekday"))
                })?;
                availability.mark_unavailable(parent.clone(), weekday);
            }
        }

        Ok(availability)
    }

    pub fn policy(&self) -> DutyResult<FairnessPolicy> {
        Ok(FairnessPolicy::new(self.parents()?, self.availability()?))
    }

    pub fn timezone(&self) -> DutyResult<Tz> {
        self.timezone
            .trim()
            .parse()
            .map_err(|e| DutyError::Config(format!("timezone '{}': {e}", self.timezone)))
    }

    pub fn ingest_settings(&self) -> DutyResult<IngestSettings> {
        if self.sync_concurrency == 0 {
            return Err(DutyError::Config("sync_concurrency must be at least 1".into()));
        }

        Ok(IngestSettings {
            look_ahead_days: self.look_ahead_days,
            renewal_window: parse_duration("renewal_window", &self.renewal_window)?,
            lookback: parse_duration("lookback", &self.lookback)?,
            timezone: self.timezone()?,
            sync_concurrency: self.sync_concurrency,
        })
    }

    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_path().join(STATE_FILE)
    }

    /// Create a config file with every option commented out.
    pub fn create_default_config(path: &Path) -> DutyResult<()> {
        let contents = format!(
            "\
# dutycal configuration

# The two parents sharing the duty. `first` wins ties.
# [parents]
# first = \"Alex\"
# second = \"Sam\"

# Weekdays a parent can never take:
# [unavailable]
# Alex = [\"Mon\"]

# Days regenerated after an override:
# look_ahead_days = {DEFAULT_LOOK_AHEAD_DAYS}

# Renew change subscriptions this close to expiry:
# renewal_window = \"{DEFAULT_RENEWAL_WINDOW}\"

# How far back to look for edited calendar entries:
# lookback = \"{DEFAULT_LOOKBACK}\"

# Calendar operations in flight during a sync:
# sync_concurrency = {DEFAULT_SYNC_CONCURRENCY}

# Timezone that defines \"today\":
# timezone = \"Europe/Berlin\"

# Where assignments are stored:
# data_dir = \"{DEFAULT_DATA_DIR}\"

# [remote]
# provider = \"google\"
# google_calendar_id = \"primary\"
# webhook_address = \"https://example.org/dutycal/notify\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DutyError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| DutyError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn environment(vars: Option<config::Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(vars)
}

fn parse_duration(key: &str, value: &str) -> DutyResult<chrono::Duration> {
    let std = humantime::parse_duration(value.trim())
        .map_err(|e| DutyError::Config(format!("{key} '{value}': {e}")))?;
    chrono::Duration::from_std(std)
        .map_err(|_| DutyError::Config(format!("{key} '{value}' is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[parents]
first = "Alex"
second = "Sam"
"#;

    #[test]
    fn test_defaults() {
        let config = DutyConfig::from_toml(MINIMAL).unwrap();
        let settings = config.ingest_settings().unwrap();

        assert_eq!(settings.look_ahead_days, 14);
        assert_eq!(settings.renewal_window, chrono::Duration::days(7));
        assert_eq!(settings.lookback, chrono::Duration::hours(24));
        assert_eq!(settings.timezone, Tz::UTC);
        assert_eq!(settings.sync_concurrency, 2);
        assert!(config.remote.is_none());
        assert!(config.state_path().ends_with("dutycal/state.toml"));
    }

    #[test]
    fn test_full_config() {
        let config = DutyConfig::from_toml(
            r#"
look_ahead_days = 21
lookback = "2h"
timezone = "Europe/Berlin"
sync_concurrency = 4

[parents]
first = "Alex"
second = "Sam"

[unavailable]
alex = ["Mon", "thursday"]

[remote]
provider = "google"
google_calendar_id = "family@group.calendar.google.com"
webhook_address = "https://example.org/notify"
"#,
        )
        .unwrap();

        let availability = config.availability().unwrap();
        let alex = ParentId::new("Alex");
        assert!(!availability.is_available(&alex, Weekday::Mon));
        assert!(!availability.is_available(&alex, Weekday::Thu));
        assert!(availability.is_available(&alex, Weekday::Tue));
        assert!(availability.is_available(&ParentId::new("Sam"), Weekday::Mon));

        let settings = config.ingest_settings().unwrap();
        assert_eq!(settings.look_ahead_days, 21);
        assert_eq!(settings.lookback, chrono::Duration::hours(2));
        assert_eq!(settings.timezone, chrono_tz::Europe::Berlin);

        let remote = config.remote.unwrap();
        assert_eq!(remote.provider.name(), "google");
        assert_eq!(remote.calendar_ref(), "family@group.calendar.google.com");
    }

    #[test]
    fn test_same_parent_twice_is_rejected() {
        let err = DutyConfig::from_toml(
            r#"
[parents]
first = "Alex"
second = "alex"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DutyError::Config(_)));
    }

    #[test]
    fn test_unknown_parent_in_unavailable() {
        let err = DutyConfig::from_toml(&format!("{MINIMAL}\n[unavailable]\nJo = [\"Mon\"]\n"))
            .unwrap_err();
        assert!(err.to_string().contains("does not name a configured parent"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        for extra in [
            "sync_concurrency = 0",
            "timezone = \"Mars/Olympus\"",
            "lookback = \"soon\"",
            "look_ahead_days = 0",
        ] {
            let err = DutyConfig::from_toml(&format!("{extra}\n{MINIMAL}")).unwrap_err();
            assert!(matches!(err, DutyError::Config(_)), "{extra}: {err}");
        }
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let vars = config::Map::from([
            ("DUTYCAL_LOOK_AHEAD_DAYS".to_string(), "30".to_string()),
            ("DUTYCAL_PARENTS__SECOND".to_string(), "Robin".to_string()),
        ]);
        let config: DutyConfig = Config::builder()
            .add_source(File::from(path.as_path()))
            .add_source(environment(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.look_ahead_days, 30);
        assert_eq!(config.parents.second, "Robin");
    }

    #[test]
    fn test_default_config_file_loads_once_parents_are_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dutycal/config.toml");
        DutyConfig::create_default_config(&path).unwrap();

        let template = std::fs::read_to_string(&path).unwrap();
        assert!(DutyConfig::from_toml(&template).is_err());

        let filled = template
            .replace("# [parents]", "[parents]")
            .replace("# first = ", "first = ")
            .replace("# second = ", "second = ");
        let config = DutyConfig::from_toml(&filled).unwrap();
        assert_eq!(config.parents.first, "Alex");
    }
}
