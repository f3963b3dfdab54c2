//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use modbridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub devices: Vec<MyDevice>,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn validate(&self) -> modbridge_framework::Result<()> {
///         if self.devices.is_empty() {
///             return Err(BridgeError::validation("At least one device required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Parse configuration from a JSON5 string and validate it.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        devices: Vec<String>,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn validate(&self) -> Result<()> {
            if self.devices.is_empty() {
                return Err(BridgeError::validation("At least one device required"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_runs_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ mqtt: {{ host: "localhost" }} }}"#).unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ mqtt: {{ host: "localhost" }}, devices: ["inv1"] }}"#).unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.mqtt().host, "localhost");
        assert_eq!(config.logging().level, "info");
    }

    #[test]
    fn test_parse_error() {
        let result = TestConfig::parse("{ mqtt: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
