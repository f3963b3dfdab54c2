use thiserror::Error;

/// Common error type for modbridge components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

/// Result type alias using modbridge's Error.
pub type Result<T> = std::result::Result<T, Error>;
