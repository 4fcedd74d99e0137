//! Console configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, a `.env` file,
//! `CLAWMON_*` process environment variables, command-line flags (applied by
//! the caller after [`MonitorConfig::load`]).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::BatchPolicy;
use crate::engine::{BufferPolicy, StreamSettings, DEFAULT_RETAIN, DEFAULT_SOFT_CAP};

pub const ENV_PREFIX: &str = "CLAWMON_";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:18765";
const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("failed to read env file {path}: {message}")]
    EnvFile { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_buffer_soft_cap")]
    pub buffer_soft_cap: usize,
    #[serde(default = "default_buffer_retain")]
    pub buffer_retain: usize,
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
    #[serde(default = "default_sessions_interval_ms")]
    pub sessions_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_buffer_soft_cap() -> usize {
    DEFAULT_SOFT_CAP
}

fn default_buffer_retain() -> usize {
    DEFAULT_RETAIN
}

fn default_health_interval_ms() -> u64 {
    3_000
}

fn default_sessions_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_max_batch() -> usize {
    50
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            password: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            buffer_soft_cap: default_buffer_soft_cap(),
            buffer_retain: default_buffer_retain(),
            health_interval_ms: default_health_interval_ms(),
            sessions_interval_ms: default_sessions_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            max_batch: default_max_batch(),
        }
    }
}

impl MonitorConfig {
    /// Defaults, then `env_file` (or `./.env` if present), then the process
    /// environment.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(env_file, std::env::vars())
    }

    pub fn load_from(
        env_file: Option<&Path>,
        process_env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut vars: HashMap<String, String> = HashMap::new();

        let default_file = Path::new(DEFAULT_ENV_FILE);
        let file = match env_file {
            Some(path) => Some(path),
            None if default_file.is_file() => Some(default_file),
            None => None,
        };
        if let Some(path) = file {
            vars.extend(read_env_file(path)?);
        }
        vars.extend(process_env);

        let mut config = Self::default();
        config.apply_vars(&vars)?;
        Ok(config)
    }

    /// Apply `CLAWMON_*` overrides. Unrelated keys are ignored.
    pub fn apply_vars(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        let get = |name: &str| {
            vars.get(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = get("URL") {
            self.base_url = url.to_string();
        }
        if let Some(password) = get("PASSWORD") {
            self.password = Some(password.to_string());
        }
        set_number(&mut self.reconnect_delay_ms, "RECONNECT_DELAY_MS", get("RECONNECT_DELAY_MS"))?;
        set_number(&mut self.buffer_soft_cap, "BUFFER_SOFT_CAP", get("BUFFER_SOFT_CAP"))?;
        set_number(&mut self.buffer_retain, "BUFFER_RETAIN", get("BUFFER_RETAIN"))?;
        set_number(&mut self.health_interval_ms, "HEALTH_INTERVAL_MS", get("HEALTH_INTERVAL_MS"))?;
        set_number(
            &mut self.sessions_interval_ms,
            "SESSIONS_INTERVAL_MS",
            get("SESSIONS_INTERVAL_MS"),
        )?;
        set_number(&mut self.request_timeout_ms, "REQUEST_TIMEOUT_MS", get("REQUEST_TIMEOUT_MS"))?;
        set_number(&mut self.flush_interval_ms, "FLUSH_INTERVAL_MS", get("FLUSH_INTERVAL_MS"))?;
        set_number(&mut self.max_batch, "MAX_BATCH", get("MAX_BATCH"))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "base url must start with http:// or https://, got {url:?}"
            )));
        }
        if self.buffer_retain == 0 {
            return Err(ConfigError::Validation(
                "buffer retain must be greater than 0".to_string(),
            ));
        }
        if self.buffer_retain >= self.buffer_soft_cap {
            return Err(ConfigError::Validation(format!(
                "buffer retain ({}) must be below the soft cap ({})",
                self.buffer_retain, self.buffer_soft_cap
            )));
        }
        for (name, value) in [
            ("reconnect delay", self.reconnect_delay_ms),
            ("health interval", self.health_interval_ms),
            ("sessions interval", self.sessions_interval_ms),
            ("request timeout", self.request_timeout_ms),
            ("flush interval", self.flush_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        if self.max_batch == 0 {
            return Err(ConfigError::Validation(
                "max batch must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            buffer: BufferPolicy {
                soft_cap: self.buffer_soft_cap,
                retain: self.buffer_retain,
            },
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            max_batch: self.max_batch,
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn sessions_interval(&self) -> Duration {
        Duration::from_millis(self.sessions_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let env_error = |message: String| ConfigError::EnvFile {
        path: path.to_path_buf(),
        message,
    };
    dotenvy::from_path_iter(path)
        .map_err(|e| env_error(e.to_string()))?
        .map(|item| item.map_err(|e| env_error(e.to_string())))
        .collect()
}

fn set_number<T: std::str::FromStr>(
    slot: &mut T,
    name: &str,
    value: Option<&str>,
) -> Result<(), ConfigError>
where
    T::Err: std::fmt::Display,
{
    if let Some(value) = value {
        *slot = value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: format!("{ENV_PREFIX}{name}"),
            value: value.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
