//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend location, credential mode, timeouts, and session-monitor timing.
//!
//! Configuration is stored at `~/.config/coursebook/config.json`. The
//! `COURSEBOOK_API_URL` and `COURSEBOOK_CREDENTIAL_MODE` environment
//! variables override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "coursebook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Path prefix every REST resource lives under
const API_PREFIX: &str = "/api/v1";

/// Backend origin when nothing is configured
const DEFAULT_API_ORIGIN: &str = "http://localhost:8080";

const ENV_API_URL: &str = "COURSEBOOK_API_URL";
const ENV_CREDENTIAL_MODE: &str = "COURSEBOOK_CREDENTIAL_MODE";

/// How the access credential travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// httpOnly cookies managed by the server; nothing stored client-side
    #[default]
    Cookie,
    /// `Authorization: Bearer` with a client-held token pair
    Bearer,
}

impl std::str::FromStr for CredentialMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cookie" | "cookies" => Ok(CredentialMode::Cookie),
            "bearer" | "token" => Ok(CredentialMode::Bearer),
            other => Err(format!("unknown credential mode: {}", other)),
        }
    }
}

/// Session expiry monitor timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// How often the expiry deadline is checked.
    /// 30s keeps the countdown honest without busy polling.
    pub check_interval_secs: u64,
    /// Remaining time at which the expiry warning appears (2 minutes)
    pub warning_threshold_secs: u64,
    /// How far an extension pushes the deadline (15 minutes, the access credential lifetime)
    pub renewal_window_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            warning_threshold_secs: 120,
            renewal_window_secs: 15 * 60,
        }
    }
}

impl SessionSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.warning_threshold_secs)
    }

    pub fn renewal_window(&self) -> Duration {
        Duration::from_secs(self.renewal_window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend origin, e.g. `https://learn.example.com`
    pub api_base_url: Option<String>,
    pub credential_mode: CredentialMode,
    pub last_email: Option<String>,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub cache_stale_minutes: i64,
    pub session: SessionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            credential_mode: CredentialMode::Cookie,
            last_email: None,
            request_timeout_secs: 30,
            refresh_timeout_secs: 30,
            cache_stale_minutes: 60,
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Load from disk (defaults when absent), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_CREDENTIAL_MODE).ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, mode: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(mode) = mode {
            match mode.parse() {
                Ok(mode) => self.credential_mode = mode,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_MODE),
            }
        }
    }

    /// Full API base URL with the `/api/v1` prefix
    pub fn api_url(&self) -> String {
        let origin = self
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_ORIGIN)
            .trim_end_matches('/');
        if origin.ends_with(API_PREFIX) {
            origin.to_string()
        } else {
            format!("{}{}", origin, API_PREFIX)
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
