//! TOML-based application configuration.
//!
//! Stores engine and gateway settings:
//! - Tick interval driving schedule evaluation
//! - Default grace period / retry policy applied to new schedules
//! - Provider webhook endpoints and per-channel send timeouts
//!
//! Configuration is stored at `~/.config/vigil/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Engine loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between evaluation ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_grace_period_minutes")]
    pub default_grace_period_minutes: u32,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default = "default_retry_interval_minutes")]
    pub default_retry_interval_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            default_grace_period_minutes: default_grace_period_minutes(),
            default_max_retries: default_max_retries(),
            default_retry_interval_minutes: default_retry_interval_minutes(),
        }
    }
}

/// Notification gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Provider webhook endpoint per channel name
    /// (push/whatsapp/sms/voice/email).
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    /// Per-channel send timeout in seconds. Channels without an entry use
    /// `default_timeout_secs`.
    #[serde(default)]
    pub timeouts_secs: HashMap<String, u64>,
    #[serde(default = "default_send_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            timeouts_secs: HashMap::new(),
            default_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Timeout to apply for a channel.
    pub fn timeout_secs_for(&self, channel: &str) -> u64 {
        self.timeouts_secs
            .get(channel)
            .copied()
            .unwrap_or(self.default_timeout_secs)
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/vigil/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/vigil"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_grace_period_minutes() -> u32 {
    crate::model::DEFAULT_GRACE_PERIOD_MINUTES
}

fn default_max_retries() -> u32 {
    crate::model::DEFAULT_MAX_RETRIES
}

fn default_retry_interval_minutes() -> u32 {
    crate::model::DEFAULT_RETRY_INTERVAL_MINUTES
}

fn default_send_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_product_constants() {
        let config = Config::default();
        assert_eq!(config.engine.tick_interval_secs, 60);
        assert_eq!(config.engine.default_grace_period_minutes, 30);
        assert_eq!(config.engine.default_max_retries, 2);
        assert_eq!(config.engine.default_retry_interval_minutes, 10);
    }

    #[test]
    fn missing_fields_fall_back() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            tick_interval_secs = 30

            [gateway]
            default_timeout_secs = 5

            [gateway.endpoints]
            sms = "https://provider.example/sms"

            [gateway.timeouts_secs]
            voice = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.tick_interval_secs, 30);
        assert_eq!(config.engine.default_grace_period_minutes, 30);
        assert_eq!(config.gateway.timeout_secs_for("voice"), 20);
        assert_eq!(config.gateway.timeout_secs_for("sms"), 5);
        assert_eq!(
            config.gateway.endpoints.get("sms").map(String::as_str),
            Some("https://provider.example/sms")
        );
    }
}
