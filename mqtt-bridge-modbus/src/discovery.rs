//! MQTT discovery payloads.
//!
//! One retained descriptor is published per (device, register) pair at
//! startup so a consumer can create the entity, with its name, unit and
//! device grouping, before the first value arrives.

use modbridge_common::TopicBuilder;
use modbridge_framework::{MessageSink, PublishStats};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{DiscoveryConfig, ModbusBridgeConfig};
use crate::schema::RegisterDescriptor;

/// Display name used when a register has none.
const UNKNOWN_NAME: &str = "Unknown";

/// Discovery descriptor for one entity.
///
/// Optional fields are omitted from the JSON when unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub state_topic: String,
    pub unique_id: String,
    pub device: DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

/// Device block grouping all entities of one field device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DiscoveryPayload {
    /// Build the descriptor for `register` on device `device_name`.
    pub fn new(
        topics: &TopicBuilder,
        identity: &DiscoveryConfig,
        device_name: &str,
        register: &RegisterDescriptor,
    ) -> Self {
        let slug = register.slug();

        Self {
            name: format!(
                "{} {}",
                device_name,
                register.name.as_deref().unwrap_or(UNKNOWN_NAME)
            ),
            state_topic: topics.state(device_name, slug),
            unique_id: format!("{}_{}", device_name, slug),
            device: DeviceInfo {
                identifiers: vec![device_name.to_string()],
                name: device_name.to_string(),
                manufacturer: identity.manufacturer.clone(),
                model: identity.model.clone(),
            },
            unit_of_measurement: register.unit.clone(),
            device_class: register.device_class.clone(),
            state_class: register.state_class.clone(),
            value_template: register.value_template.clone(),
        }
    }
}

/// Publish the retained discovery descriptor for one (device, register) pair.
pub async fn publish_descriptor<S: MessageSink>(
    sink: &S,
    topics: &TopicBuilder,
    identity: &DiscoveryConfig,
    device_name: &str,
    register: &RegisterDescriptor,
) -> modbridge_framework::Result<()> {
    let topic = topics.discovery(device_name, register.slug());
    let payload = DiscoveryPayload::new(topics, identity, device_name, register);

    sink.publish_json(&topic, &payload, true).await?;
    debug!(%topic, unique_id = %payload.unique_id, "Published discovery");

    Ok(())
}

/// Publish discovery descriptors for every configured device and register.
///
/// Failures are logged and counted; they never stop the remaining publishes.
pub async fn publish_all<S: MessageSink>(sink: &S, config: &ModbusBridgeConfig) -> PublishStats {
    let topics = TopicBuilder::new(&config.mqtt.base_topic);
    let mut stats = PublishStats::default();

    for device in &config.modbus.devices {
        for register in &config.modbus.registers {
            let result =
                publish_descriptor(sink, &topics, &config.discovery, &device.name, register).await;

            if let Err(e) = &result {
                warn!(
                    device = %device.name,
                    register = %register.id,
                    error = %e,
                    "Failed to publish discovery"
                );
            }
            stats.record(&result);
        }
    }

    stats
}
