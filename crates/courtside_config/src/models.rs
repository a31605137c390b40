// --- File: crates/courtside_config/src/models.rs ---

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default timeout for backend requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Hourly refresh check
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;

/// Heartbeat registration after twelve hours without a successful call
pub const DEFAULT_STALENESS_WINDOW_SECS: u64 = 12 * 60 * 60;

/// Problems found while validating a loaded configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigIssue {
    #[error("push.project_id is not set")]
    MissingProjectId,
    #[error("api.base_url is not set")]
    MissingBaseUrl,
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

// --- Backend API Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the Courtside backend, without the `/api` suffix.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigIssue::MissingBaseUrl);
        }
        Ok(())
    }
}

// --- Push Notification Config ---
// The project id is the identifier the platform token-issuance API requires.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_staleness_window_secs")]
    pub staleness_window_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            staleness_window_secs: DEFAULT_STALENESS_WINDOW_SECS,
        }
    }
}

impl PushConfig {
    /// Returns the project id if it is present and not blank.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigIssue> {
        if self.project_id().is_none() {
            return Err(ConfigIssue::MissingProjectId);
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigIssue::ZeroInterval("push.refresh_interval_secs"));
        }
        if self.staleness_window_secs == 0 {
            return Err(ConfigIssue::ZeroInterval("push.staleness_window_secs"));
        }
        Ok(())
    }
}

// --- Logging Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

// --- Device Session Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    /// JSON file backing the persistent key-value store.
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_staleness_window_secs() -> u64 {
    DEFAULT_STALENESS_WINDOW_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_state_path() -> String {
    "device-state.json".to_string()
}
