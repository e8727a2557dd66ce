//! Layered configuration for boardsync.
//!
//! Settings are read from a TOML file, then overridden by environment
//! variables, then by command-line flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "https://trello-441q.onrender.com/api/v1"
//! request_timeout_secs = 15
//!
//! [realtime]
//! enabled = true
//! url = "wss://trello-441q.onrender.com/ws"
//! cursor_throttle_ms = 100
//! ping_interval_secs = 30
//! pong_timeout_secs = 60
//!
//! [realtime.reconnect]
//! max_attempts = 5
//! base_delay_ms = 500
//! max_delay_ms = 10000
//!
//! [logging]
//! filter = "info"
//! format = "pretty"
//! ```
//!
//! | Variable                 | Overrides              |
//! |--------------------------|------------------------|
//! | `BOARDSYNC_API_URL`      | `api.base_url`         |
//! | `BOARDSYNC_TOKEN`        | `api.token`            |
//! | `BOARDSYNC_REALTIME_URL` | `realtime.url`         |
//! | `BOARDSYNC_LOG`          | `logging.filter`       |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR: &str = ".boardsync";
pub const CONFIG_FILE: &str = "boardsync.toml";

/// Persistence API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for a single request; zero disables the bound
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bearer token attached to every request when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "https://trello-441q.onrender.com/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            token: None,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Backoff policy applied after the realtime transport drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before reconnect attempt `attempt` (zero-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Realtime channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,
    #[serde(default = "default_realtime_url")]
    pub url: String,
    /// Minimum spacing between two outbound cursor updates
    #[serde(default = "default_cursor_throttle_ms")]
    pub cursor_throttle_ms: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_realtime_enabled() -> bool {
    true
}

fn default_realtime_url() -> String {
    "wss://trello-441q.onrender.com/ws".to_string()
}

/// Peers get at most ten cursor updates per second.
pub const MIN_CURSOR_THROTTLE_MS: u64 = 100;

fn default_cursor_throttle_ms() -> u64 {
    MIN_CURSOR_THROTTLE_MS
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_pong_timeout_secs() -> u64 {
    60
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
            url: default_realtime_url(),
            cursor_throttle_ms: default_cursor_throttle_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn cursor_throttle(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms.max(MIN_CURSOR_THROTTLE_MS))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

/// Root of `boardsync.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse boardsync.toml")
    }

    /// Resolve the effective configuration: explicit path, then the project
    /// file, then the per-user file, then defaults; environment overrides last.
    pub fn discover(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::candidate_paths(project_dir)
                .into_iter()
                .find(|p| p.exists())
            {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Files consulted by [`SyncConfig::discover`], in priority order.
    pub fn candidate_paths(project_dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![project_dir.join(CONFIG_DIR).join(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("boardsync").join("config.toml"));
        }
        paths
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BOARDSYNC_API_URL").filter(|v| !v.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("BOARDSYNC_TOKEN").filter(|v| !v.is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(url) = lookup("BOARDSYNC_REALTIME_URL").filter(|v| !v.is_empty()) {
            self.realtime.url = url;
        }
        if let Some(filter) = lookup("BOARDSYNC_LOG").filter(|v| !v.is_empty()) {
            self.logging.filter = filter;
        }
    }

    /// Render as TOML with the token redacted.
    pub fn to_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.api.token.is_some() {
            shown.api.token = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize boardsync.toml")
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = Self::default().to_toml()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            warnings.push(format!(
                "api.base_url '{}' should start with http:// or https://",
                self.api.base_url
            ));
        }
        if self.api.request_timeout_secs == 0 {
            warnings.push(
                "api.request_timeout_secs is 0: requests may hang indefinitely".to_string(),
            );
        }
        if self.realtime.enabled
            && !self.realtime.url.starts_with("ws://")
            && !self.realtime.url.starts_with("wss://")
        {
            warnings.push(format!(
                "realtime.url '{}' should start with ws:// or wss://",
                self.realtime.url
            ));
        }
        if self.realtime.cursor_throttle_ms < MIN_CURSOR_THROTTLE_MS {
            warnings.push(format!(
                "realtime.cursor_throttle_ms = {} is below the {} ms minimum and will be raised",
                self.realtime.cursor_throttle_ms, MIN_CURSOR_THROTTLE_MS
            ));
        }
        if self.realtime.pong_timeout_secs <= self.realtime.ping_interval_secs {
            warnings.push(
                "realtime.pong_timeout_secs should exceed ping_interval_secs".to_string(),
            );
        }
        let reconnect = &self.realtime.reconnect;
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            warnings.push(format!(
                "realtime.reconnect.max_delay_ms ({}) is below base_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.base_delay_ms
            ));
        }

        warnings
    }
}
