// RpaDeck — Configuration (JSON file + RPADECK_ environment overrides)
// License: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_connect_timeout_secs() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Session monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
    #[serde(default = "default_stream_probe_interval_ms")]
    pub stream_probe_interval_ms: u64,
    #[serde(default = "default_screenshot_interval_ms")]
    pub screenshot_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: default_health_interval_ms(),
            stream_probe_interval_ms: default_stream_probe_interval_ms(),
            screenshot_interval_ms: default_screenshot_interval_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn stream_probe_interval(&self) -> Duration {
        Duration::from_millis(self.stream_probe_interval_ms)
    }

    pub fn screenshot_interval(&self) -> Duration {
        Duration::from_millis(self.screenshot_interval_ms)
    }
}

fn default_health_interval_ms() -> u64 {
    5_000
}
fn default_stream_probe_interval_ms() -> u64 {
    10_000
}
fn default_screenshot_interval_ms() -> u64 {
    1_000
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_workflows_path")]
    pub workflows_path: String,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            workflows_path: default_workflows_path(),
            templates_dir: default_templates_dir(),
        }
    }
}

fn default_workflows_path() -> String {
    "~/.rpadeck/workflows.json".to_string()
}
fn default_templates_dir() -> String {
    "~/.rpadeck/templates".to_string()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a JSON file, falling back to defaults.
    ///
    /// Environment overrides are applied in both cases, so a bare
    /// `RPADECK_BACKEND_URL` is enough to point at a non-local backend.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, env_lookup)
    }

    /// Like `load`, but an unreadable or malformed file also falls back to
    /// defaults. Environment overrides still apply.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load_or_default_with(path, env_lookup)
    }

    fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    fn load_or_default_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::load_with(path, &lookup).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            let mut config = Config::default();
            config.apply_overrides(&lookup);
            config
        })
    }

    /// Apply overrides (prefix: RPADECK_) from `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RPADECK_BACKEND_URL") {
            self.backend.base_url = v;
        }
        if let Some(n) = lookup("RPADECK_BACKEND_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.backend.timeout_secs = n;
        }
        if let Some(n) = lookup("RPADECK_MONITOR_HEALTH_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.monitor.health_interval_ms = n;
        }
        if let Some(n) =
            lookup("RPADECK_MONITOR_STREAM_PROBE_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.monitor.stream_probe_interval_ms = n;
        }
        if let Some(n) =
            lookup("RPADECK_MONITOR_SCREENSHOT_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.monitor.screenshot_interval_ms = n;
        }
        if let Some(v) = lookup("RPADECK_STORAGE_WORKFLOWS_PATH") {
            self.storage.workflows_path = v;
        }
        if let Some(v) = lookup("RPADECK_STORAGE_TEMPLATES_DIR") {
            self.storage.templates_dir = v;
        }
    }

    /// Resolve the workflow store file, expanding `~` to the home directory.
    pub fn workflows_path(&self) -> Result<PathBuf, ConfigError> {
        expand_home(&self.storage.workflows_path)
    }

    /// Resolve the directory scanned for user templates.
    pub fn templates_dir(&self) -> Result<PathBuf, ConfigError> {
        expand_home(&self.storage.templates_dir)
    }

    /// Get the default config file path: ~/.rpadeck/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".rpadeck").join("config.json"))
    }

    /// Validate configuration for basic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.backend.base_url;
        let parsed = url::Url::parse(base).map_err(|e| ConfigError::InvalidBackendUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBackendUrl {
                url: base.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let intervals = [
            ("health_interval_ms", self.monitor.health_interval_ms),
            ("stream_probe_interval_ms", self.monitor.stream_probe_interval_ms),
            ("screenshot_interval_ms", self.monitor.screenshot_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Other(format!(
                    "monitor.{} must be greater than zero",
                    name
                )));
            }
        }

        if self.backend.timeout_secs == 0 {
            tracing::warn!("backend.timeout_secs is 0; requests will fail immediately");
        }

        Ok(())
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    if let Some(stripped) = path.strip_prefix('~') {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(path.strip_prefix("~/").unwrap_or(stripped)))
    } else {
        Ok(PathBuf::from(path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
