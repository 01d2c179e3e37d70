//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "sms-dispatcher.toml",
    "./config/config.toml",
    "/etc/sms-dispatcher/config.toml",
];

/// Environment variable naming an explicit config file
const CONFIG_PATH_ENV: &str = "SMS_DISPATCHER_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides,
    /// then validate the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `SMS_*` overrides. Unparseable numeric values are ignored.
fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP
    if let Some(val) = lookup("SMS_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(val) = lookup("SMS_HTTP_PORT") {
        if let Ok(port) = val.parse() {
            config.http.port = port;
        }
    }

    // Database
    if let Some(val) = lookup("SMS_DATABASE_URL") {
        config.database.url = val;
    }
    if let Some(val) = lookup("SMS_DATABASE_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse() {
            config.database.max_connections = max;
        }
    }
    if let Some(val) = lookup("SMS_DATABASE_SEED") {
        config.database.seed = val.parse().unwrap_or(true);
    }

    // Dispatcher
    if let Some(val) = lookup("SMS_DISPATCHER_BATCH_SIZE") {
        if let Ok(size) = val.parse() {
            config.dispatcher.batch_size = size;
        }
    }
    if let Some(val) = lookup("SMS_DISPATCHER_PERIOD_SECS") {
        if let Ok(secs) = val.parse() {
            config.dispatcher.period_secs = secs;
        }
    }

    // Delivery
    if let Some(val) = lookup("SMS_DELIVERY_BASE_URL") {
        config.delivery.base_url = val;
    }
    if let Some(val) = lookup("SMS_DELIVERY_API_TOKEN") {
        config.delivery.api_token = if val.is_empty() { None } else { Some(val) };
    }
    if let Some(val) = lookup("SMS_DELIVERY_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = val.parse() {
            config.delivery.connect_timeout_ms = ms;
        }
    }
    if let Some(val) = lookup("SMS_DELIVERY_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = val.parse() {
            config.delivery.request_timeout_ms = Some(ms);
        }
    }

    // Redis
    if let Some(val) = lookup("SMS_REDIS_URL") {
        config.redis.url = val;
    }
}
