//! ==============================================================================
//! error.rs - crate error type
//! ==============================================================================
//!
//! only bootstrap paths (config loading, bus setup) produce errors.
//! ingestion and fan-out log and skip instead of failing.
//!
//! ==============================================================================

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or incomplete configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// MQTT client request error
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}
