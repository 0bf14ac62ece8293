//! Configuration system (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::capture::{ActionTrail, DEFAULT_TRAIL_CAPACITY};
use crate::dispatch::DispatchConfig;
use crate::recovery::{BulkheadConfig, CircuitBreakerConfig, RetryPolicy};

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV: &str = "FAULTLINE_CONFIG";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Action-trail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub trail_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            trail_capacity: DEFAULT_TRAIL_CAPACITY,
        }
    }
}

/// All tunables of the error pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultlineConfig {
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
    pub dispatch: DispatchConfig,
    pub capture: CaptureConfig,
}

impl FaultlineConfig {
    /// Resolve configuration.
    ///
    /// Starts from defaults, reads `path` (or the file named by
    /// `FAULTLINE_CONFIG`) when given, then applies `FAULTLINE_*`
    /// environment overrides, including ones from a `.env` file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FAULTLINE_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_value("FAULTLINE_RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = v;
        }
        if let Some(v) = env_millis("FAULTLINE_RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay = v;
        }
        if let Some(v) = env_millis("FAULTLINE_RETRY_MAX_DELAY_MS")? {
            self.retry.max_delay = v;
        }
        if let Some(v) = env_value("FAULTLINE_RETRY_EXPONENTIAL")? {
            self.retry.exponential = v;
        }
        if let Some(v) = env_value("FAULTLINE_BREAKER_FAILURE_THRESHOLD")? {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = env_millis("FAULTLINE_BREAKER_RESET_TIMEOUT_MS")? {
            self.circuit_breaker.reset_timeout = v;
        }
        if let Some(v) = env_value("FAULTLINE_BULKHEAD_MAX_CONCURRENCY")? {
            self.bulkhead.max_concurrency = v;
        }
        if let Some(v) = env_millis("FAULTLINE_DEDUP_WINDOW_MS")? {
            self.dispatch.dedup_window = v;
        }
        if let Some(v) = env_value("FAULTLINE_TRAIL_CAPACITY")? {
            self.capture.trail_capacity = v;
        }
        Ok(())
    }

    /// Reject settings that would disable a strategy by accident.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be below retry.base_delay_ms".into(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.bulkhead.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "bulkhead.max_concurrency must be at least 1".into(),
            ));
        }
        if self.dispatch.dedup_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.dedup_capacity must be at least 1".into(),
            ));
        }
        if self.capture.trail_capacity == 0 {
            return Err(ConfigError::Invalid(
                "capture.trail_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// A fresh action trail sized by this config.
    pub fn action_trail(&self) -> ActionTrail {
        ActionTrail::new(self.capture.trail_capacity)
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed = raw.trim().parse::<T>();
            match parsed {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value: raw,
                }),
            }
        }
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<std::time::Duration>, ConfigError> {
    Ok(env_value::<u64>(key)?.map(std::time::Duration::from_millis))
}

/// Serde adapter storing a `Duration` as whole milliseconds.
pub mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
