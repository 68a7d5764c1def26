//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file and checks it before bootstrap.
//!
//! structure:
//!     - MqttConfig: Broker address, credentials and reconnect pacing.
//!     - ServerConfig: Where the dashboard and websocket listen.
//!     - LoggingConfig: Default log filter when RUST_LOG is unset.
//!     - sensors: One SensorDescriptor per [[sensors]] table.
//!
//! ==============================================================================

use crate::domain::SensorDescriptor;
use crate::error::{Error, Result};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    pub mqtt: MqttConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sensors: Vec<SensorDescriptor>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "telemetry-host".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_level() -> String {
    "info".to_string()
}

impl MqttConfig {
    /// credentials are only sent when both halves are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }
}

impl HostConfig {
    /// default location, relative to the working directory
    pub fn default_path() -> PathBuf {
        PathBuf::from("config").join("host.toml")
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HostConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the host can't start with
    ///
    /// duplicate topics are allowed here; the store keeps the first one.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.trim().is_empty() {
            return Err(Error::Config("mqtt.host must not be empty".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("server.host must not be empty".into()));
        }
        if let Some(i) = self.sensors.iter().position(|s| s.topic.trim().is_empty()) {
            return Err(Error::Config(format!("sensors[{}].topic must not be empty", i)));
        }
        Ok(())
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            mqtt = %format!("{}:{}", self.mqtt.host, self.mqtt.port),
            server = %format!("{}:{}", self.server.host, self.server.port),
            sensors = self.sensors.len(),
            log_level = %self.logging.level,
            "Host configuration"
        );
    }
}
