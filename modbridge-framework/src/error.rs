//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The broker could not be reached within the retry budget.
    #[error("MQTT connection error: {0}")]
    MqttConnection(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<modbridge_common::Error> for BridgeError {
    fn from(err: modbridge_common::Error) -> Self {
        match err {
            modbridge_common::Error::Config(msg) => Self::Config(msg),
            modbridge_common::Error::Connection(e) => Self::MqttConnection(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_config_error_maps_to_config() {
        let err: BridgeError =
            modbridge_common::Error::Config("Failed to initialize tracing".to_string()).into();
        assert!(matches!(err, BridgeError::Config(msg) if msg == "Failed to initialize tracing"));
    }

    #[test]
    fn test_json5_error_maps_to_parse() {
        let err: BridgeError = json5::from_str::<serde_json::Value>("{ host: ")
            .unwrap_err()
            .into();
        assert!(matches!(err, BridgeError::ConfigParse(_)));
    }
}
