//! View configuration loaded from `understory.toml`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::correlator::DEFAULT_REQUEST_TIMEOUT;
use crate::scheduler::DEFAULT_REFRESH_INTERVAL;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "understory.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// WebSocket URL of the analysis backend.
    pub backend_url: String,
    pub refresh_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Where the renderer-facing server binds.
    pub host: String,
    pub port: u16,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            backend_url: "ws://127.0.0.1:7891/events".to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

impl ViewConfig {
    /// Read `path`, falling back to defaults for missing keys. A missing
    /// file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the session cannot run with. Call again after applying
    /// overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.backend_url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "backend_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
