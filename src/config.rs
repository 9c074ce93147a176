//! Configuration management for the RAX FTP client
//!
//! Loads settings from an optional `client.toml` with `RAX_FTP_*`
//! environment overrides. Unlike a server, a client must come up with
//! no configuration at all, so every field has a default.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host for the control connection
    pub host: String,

    /// Server port for the control connection
    pub port: u16,

    /// Control connection establishment timeout
    pub connect_timeout_secs: u64,

    /// Bounded wait for data-channel accept/connect
    pub data_timeout_secs: u64,

    /// Chunk size for file transfers
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            connect_timeout_secs: 10,
            data_timeout_secs: 5,
            buffer_size: 8192,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `client.toml` (when present) with
    /// environment overrides, e.g. `RAX_FTP_HOST`, `RAX_FTP_PORT`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("client").required(false))
            .add_source(Environment::with_prefix("RAX_FTP"))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.host.is_empty() {
            return Err(config::ConfigError::Message("host cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.data_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "data_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Control connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Data channel deadline as Duration
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}
