//! Application configuration.
//!
//! Loaded from TOML, then secrets are overlaid from the environment:
//!
//! | source | key |
//! |---|---|
//! | `--config` / `SWAPWATCH_CONFIG` / `config/default.toml` | file path |
//! | `SWAPWATCH_API_KEY` | `upstream.api_key` |
//! | `SWAPWATCH_API_SECRET` | `upstream.api_secret` |

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use swapwatch_client::{ClientConfig, RetryPolicy};
use swapwatch_gateway::GatewayConfig;
use swapwatch_tracker::{default_rate_threshold, PollingConfig};
use zeroize::Zeroize;

use crate::error::{AppError, AppResult};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "SWAPWATCH_CONFIG";
pub const API_KEY_ENV: &str = "SWAPWATCH_API_KEY";
pub const API_SECRET_ENV: &str = "SWAPWATCH_API_SECRET";

/// Upstream exchange API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API base URL; `/order` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Usually supplied via `SWAPWATCH_API_KEY`.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Usually supplied via `SWAPWATCH_API_SECRET`.
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Per-call timeout (ms). Default: 10,000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Attempts per status request, first one included. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry (ms). Default: 500.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap (ms). Default: 5,000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://ff.io/api/v2".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            api_secret: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("api_secret_set", &!self.api_secret.is_empty())
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl Drop for UpstreamConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
        self.api_secret.zeroize();
    }
}

impl UpstreamConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.base_url, &self.api_key);
        config.request_timeout = Duration::from_millis(self.request_timeout_ms);
        config.retry = self.retry_policy();
        config
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Delay between successful cycles (ms). Default: 15,000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Backoff cap after consecutive failures (ms). Default: 120,000.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Relative rate drift reported as a divergence. Default: 0.05.
    #[serde(default = "default_rate_threshold")]
    pub rate_threshold: Decimal,
    /// Allow forced-status simulation. Default: false.
    #[serde(default)]
    pub simulation_enabled: bool,
    /// Event channel capacity. Default: 64.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_max_interval_ms() -> u64 {
    120_000
}

fn default_event_capacity() -> usize {
    64
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            rate_threshold: default_rate_threshold(),
            simulation_enabled: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl From<&PollingSettings> for PollingConfig {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            rate_threshold: settings.rate_threshold,
            simulation_enabled: settings.simulation_enabled,
            event_capacity: settings.event_capacity,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding `completions.jsonl`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Config path: CLI arg > `SWAPWATCH_CONFIG` > default.
    pub fn resolve_path(cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load the file (defaults if missing), overlay env secrets, validate.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let path = Self::resolve_path(cli_path);
        let mut config = if Path::new(&path).exists() {
            tracing::info!(path = %path, "Loading configuration");
            Self::from_file(&path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_secrets(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(API_SECRET_ENV).ok(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Overlay secrets; unset or empty values keep the file's.
    pub fn apply_secrets(&mut self, api_key: Option<String>, api_secret: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.upstream.api_key = key.trim().to_string();
        }
        if let Some(secret) = api_secret.filter(|s| !s.trim().is_empty()) {
            self.upstream.api_secret = secret.trim().to_string();
        }
    }

    /// Reject settings the polling loop cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(AppError::Config("upstream.base_url is empty".to_string()));
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "upstream.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.upstream.max_attempts == 0 {
            return Err(AppError::Config(
                "upstream.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.polling.interval_ms == 0 {
            return Err(AppError::Config(
                "polling.interval_ms must be positive".to_string(),
            ));
        }
        if self.polling.max_interval_ms < self.polling.interval_ms {
            return Err(AppError::Config(
                "polling.max_interval_ms must be >= polling.interval_ms".to_string(),
            ));
        }
        if self.polling.rate_threshold <= Decimal::ZERO {
            return Err(AppError::Config(
                "polling.rate_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials are only needed by commands that talk to the upstream.
    pub fn require_credentials(&self) -> AppResult<()> {
        if self.upstream.api_key.is_empty() {
            return Err(AppError::Config(format!(
                "API key missing: set {API_KEY_ENV} or upstream.api_key"
            )));
        }
        if self.upstream.api_secret.is_empty() {
            return Err(AppError::Config(format!(
                "API secret missing: set {API_SECRET_ENV} or upstream.api_secret"
            )));
        }
        Ok(())
    }
}
