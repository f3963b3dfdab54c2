use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::topic::DEFAULT_BASE_TOPIC;

/// MQTT broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Topic prefix for discovery and state topics.
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Optional username; credentials are only sent when this is non-empty.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Connection attempts at startup before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay between startup connection attempts, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.to_string()
}

fn default_client_id() -> String {
    "modbus_mqtt".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    5
}

impl MqttConfig {
    /// Create a configuration for `host` with every other field defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mqtt_port(),
            base_topic: default_base_topic(),
            username: None,
            password: None,
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            connect_retries: default_connect_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }

    /// Username/password pair, if a username is configured.
    ///
    /// A missing password is sent as an empty one.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => Some((user, self.password.as_deref().unwrap_or(""))),
            _ => None,
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
