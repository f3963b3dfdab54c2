//! Configuration for the Modbus bridge.

use std::time::Duration;

use modbridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig};
use serde::{Deserialize, Serialize};

use crate::schema::RegisterSchema;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusBridgeConfig {
    /// MQTT broker settings
    pub mqtt: MqttConfig,

    /// Modbus-specific settings
    pub modbus: ModbusConfig,

    /// Device identity advertised in discovery payloads
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Modbus polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Devices to poll, in polling order
    pub devices: Vec<DeviceConfig>,

    /// Registers read from every device, in publishing order
    pub registers: RegisterSchema,

    /// Delay between poll cycles in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Per-call connect/read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How devices are polled within a cycle
    #[serde(default)]
    pub strategy: PollStrategy,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    5000
}

impl ModbusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Device polling strategy within one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStrategy {
    /// One device at a time, in configuration order (default)
    #[default]
    Sequential,
    /// One task per device, all devices at once
    Concurrent,
}

/// Configuration for a single Modbus TCP device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name (used in topics and unique ids)
    pub name: String,

    /// Host address (IP or hostname)
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID
    #[serde(default = "default_unit_id", alias = "slave")]
    pub unit_id: u8,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_modbus_port(),
            unit_id: default_unit_id(),
        }
    }
}

/// Fixed device identity for the discovery `device` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_manufacturer() -> String {
    "MySolar".to_string()
}

fn default_model() -> String {
    "Modbus Inverter".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            model: default_model(),
        }
    }
}

impl BridgeConfig for ModbusBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> modbridge_framework::Result<()> {
        if self.mqtt.host.is_empty() {
            return Err(BridgeError::validation("MQTT host cannot be empty"));
        }

        if self.modbus.devices.is_empty() {
            return Err(BridgeError::validation(
                "At least one device must be configured",
            ));
        }

        if self.modbus.registers.is_empty() {
            return Err(BridgeError::validation(
                "At least one register must be configured",
            ));
        }

        if self.modbus.timeout_ms == 0 {
            return Err(BridgeError::validation("timeout_ms must be positive"));
        }

        for (i, device) in self.modbus.devices.iter().enumerate() {
            if device.name.is_empty() {
                return Err(BridgeError::validation("Device name cannot be empty"));
            }

            if device.name.contains(['/', '+', '#']) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': name must not contain '/', '+' or '#'",
                    device.name
                )));
            }

            if device.host.is_empty() {
                return Err(BridgeError::validation(format!(
                    "Device '{}' has no host",
                    device.name
                )));
            }

            if self.modbus.devices[..i].iter().any(|d| d.name == device.name) {
                return Err(BridgeError::validation(format!(
                    "Device '{}' is defined more than once",
                    device.name
                )));
            }
        }

        self.modbus
            .registers
            .validate()
            .map_err(BridgeError::validation)
    }
}
