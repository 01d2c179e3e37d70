//! SMS Dispatcher Configuration System
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub dispatcher: DispatcherSettings,
    pub delivery: DeliverySettings,
    pub redis: RedisConfig,
}

/// HTTP control plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Message store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    pub url: String,
    pub max_connections: u32,
    /// Insert demo messages when the table is empty
    pub seed: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/db.sqlite3".to_string(),
            max_connections: 5,
            seed: true,
        }
    }
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Messages fetched per cycle
    pub batch_size: u32,
    /// Seconds between the starts of consecutive cycles
    pub period_secs: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            period_secs: 120,
        }
    }
}

impl DispatcherSettings {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Third-party delivery API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub base_url: String,
    /// Optional Bearer token
    pub api_token: Option<String>,
    pub connect_timeout_ms: u64,
    /// Unset means a slow provider delays its cycle indefinitely
    pub request_timeout_ms: Option<u64>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            base_url: "https://webhook.site/e8318d16-f749-428e-9103-f1ca43e8c0dd".to_string(),
            api_token: None,
            connect_timeout_ms: 10_000,
            request_timeout_ms: None,
        }
    }
}

impl DeliverySettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Confirmation cache configuration. An empty URL disables the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://redis:6379".to_string(),
        }
    }
}

impl RedisConfig {
    pub fn enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings the dispatcher cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatcher.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher.batch_size must be positive".to_string(),
            ));
        }
        if self.dispatcher.period_secs == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher.period_secs must be positive".to_string(),
            ));
        }
        if self.delivery.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "delivery.base_url is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# SMS Dispatcher Configuration
# Environment variables (SMS_*) override these settings

[http]
host = "0.0.0.0"
port = 8080

[database]
url = "sqlite://data/db.sqlite3"
max_connections = 5
seed = true

[dispatcher]
batch_size = 2
period_secs = 120

[delivery]
base_url = "https://webhook.site/e8318d16-f749-428e-9103-f1ca43e8c0dd"
connect_timeout_ms = 10000
# request_timeout_ms = 30000
# api_token = ""

[redis]
url = "redis://redis:6379"  # empty string disables the confirmation cache
"#
        .to_string()
    }
}
