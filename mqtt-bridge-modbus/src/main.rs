//! MQTT bridge for Modbus TCP devices.
//!
//! Publishes discovery descriptors once, then polls every configured device
//! on a fixed interval until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use modbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, TopicBuilder};

use mqtt_bridge_modbus::config::ModbusBridgeConfig;
use mqtt_bridge_modbus::discovery;
use mqtt_bridge_modbus::poller::Poller;
use mqtt_bridge_modbus::transport::ModbusTcpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("modbus.json5");

    let config = ModbusBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut runner = BridgeRunner::new_with_args("modbus", config, Some(&args))
        .await
        .context("Failed to start bridge")?;

    let config = runner.config().clone();
    let publisher = runner.publisher();

    let stats = discovery::publish_all(&publisher, &config).await;
    tracing::info!(
        total = stats.total(),
        published = stats.success,
        failed = stats.failed,
        "MQTT discovery messages published"
    );

    let poller = Poller::new(
        Arc::new(config.modbus.clone()),
        TopicBuilder::new(&config.mqtt.base_topic),
        ModbusTcpTransport,
        publisher,
    );
    runner.spawn(poller.run());

    runner.run().await?;

    Ok(())
}
