use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::difficulty::Difficulty;
use crate::error_handling::RetryConfig;
use crate::gateway::GatewayConfig;
use crate::hasher::HashKind;
use crate::miner::DEFAULT_PROGRESS_INTERVAL;
use crate::types::WireSchema;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Gateway
    pub gateway_url: String,
    pub request_timeout_ms: u64,
    #[serde(skip)]
    pub wire_schema: WireSchema,

    // Mining
    pub difficulty: Difficulty,
    pub workers: u32,
    pub progress_interval: u64,
    /// Zero means no deadline.
    pub mine_timeout_ms: u64,
    #[serde(skip)]
    pub hash: HashKind,

    // Caller-side retry of transport failures
    pub max_retries: u32,
    pub retry_delay_ms: u64,

    // Logging and metrics
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
            wire_schema: WireSchema::Salted,

            difficulty: Difficulty::ZERO,
            workers: std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            mine_timeout_ms: 0,
            hash: HashKind::Sha256,

            max_retries: 0,
            retry_delay_ms: 1000,

            log_level: "info".to_string(),
            metrics_enabled: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, val: String) -> Result<T, ConfigError> {
    val.parse().map_err(|_| ConfigError::InvalidEnvVar(name.to_string(), val))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(val) = env::var("GATEWAY_URL") {
            config.gateway_url = val;
        }

        if let Ok(val) = env::var("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_var("REQUEST_TIMEOUT_MS", val)?;
        }

        if let Ok(val) = env::var("WIRE_SCHEMA") {
            config.wire_schema = parse_var("WIRE_SCHEMA", val)?;
        }

        if let Ok(val) = env::var("POW_DIFFICULTY") {
            config.difficulty = parse_var("POW_DIFFICULTY", val)?;
        }

        if let Ok(val) = env::var("POW_WORKERS") {
            config.workers = parse_var("POW_WORKERS", val)?;
        }

        if let Ok(val) = env::var("PROGRESS_INTERVAL") {
            config.progress_interval = parse_var("PROGRESS_INTERVAL", val)?;
        }

        if let Ok(val) = env::var("MINE_TIMEOUT_MS") {
            config.mine_timeout_ms = parse_var("MINE_TIMEOUT_MS", val)?;
        }

        if let Ok(val) = env::var("POW_HASH") {
            config.hash = parse_var("POW_HASH", val)?;
        }

        if let Ok(val) = env::var("MAX_RETRIES") {
            config.max_retries = parse_var("MAX_RETRIES", val)?;
        }

        if let Ok(val) = env::var("RETRY_DELAY_MS") {
            config.retry_delay_ms = parse_var("RETRY_DELAY_MS", val)?;
        }

        if let Ok(val) = env::var("LOG_LEVEL") {
            config.log_level = val;
        }

        if let Ok(val) = env::var("METRICS_ENABLED") {
            config.metrics_enabled = val == "1";
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gateway_url.starts_with("http") {
            return Err(ConfigError::ValidationError("GATEWAY_URL must be a valid HTTP URL".to_string()));
        }

        if self.workers == 0 {
            return Err(ConfigError::ValidationError("POW_WORKERS must be greater than 0".to_string()));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError("REQUEST_TIMEOUT_MS must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.clone(),
            timeout_ms: self.request_timeout_ms,
            schema: self.wire_schema,
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryConfig::default()
        }
    }

    pub fn mine_timeout(&self) -> Option<Duration> {
        (self.mine_timeout_ms > 0).then(|| Duration::from_millis(self.mine_timeout_ms))
    }
}
