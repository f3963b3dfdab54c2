//! MQTT bridge for Modbus TCP devices.
//!
//! This bridge polls holding registers on one or more Modbus TCP devices,
//! decodes them according to a shared register map and publishes the values
//! to MQTT, announcing every entity once at startup through retained
//! discovery messages.
//!
//! # Topics
//!
//! ```text
//! <base_topic>/sensor/<device>/<slug>/config   retained discovery descriptor
//! <base_topic>/sensor/<device>/<slug>/state    current value as text
//! ```
//!
//! Where:
//! - `<device>` - Device name from configuration
//! - `<slug>` - The register's `slug` if configured, else its address key

pub mod config;
pub mod decoder;
pub mod discovery;
pub mod poller;
pub mod schema;
pub mod transport;
