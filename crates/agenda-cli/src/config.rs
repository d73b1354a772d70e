//! CLI settings, read from TOML and overridden by the environment.
//!
//! ```toml
//! timezone = "Europe/Berlin"
//! preferences = "No meetings before 10am"
//!
//! [defaults]
//! list_days = 14
//! free_slot_minutes = 45
//! ```

use std::path::{Path, PathBuf};

use agenda_engine::service::QueryDefaults;
use agenda_engine::temporal::parse_timezone;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "agenda.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IANA zone used to compute "now". System local time when unset.
    pub timezone: Option<String>,
    /// Free text appended to operation descriptions.
    pub preferences: Option<String>,
    pub defaults: QueryDefaults,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// `explicit` if given, else [`DEFAULT_CONFIG_FILE`] when present, else
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config");
            return Self::from_file(path);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            tracing::debug!(path = %fallback.display(), "loading config");
            return Self::from_file(&fallback);
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `AGENDA_TIMEZONE` and `AGENDA_PREFERENCES` (or the older
    /// `USER_CALENDAR_PREFERENCES`) on top of the file values.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(tz) = var("AGENDA_TIMEZONE").filter(|v| !v.is_empty()) {
            self.timezone = Some(tz);
        }
        if let Some(prefs) = var("AGENDA_PREFERENCES")
            .or_else(|| var("USER_CALENDAR_PREFERENCES"))
            .filter(|v| !v.trim().is_empty())
        {
            self.preferences = Some(prefs);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if let Some(tz) = &self.timezone {
            parse_timezone(tz)?;
        }
        self.defaults.validate()?;
        Ok(())
    }
}
