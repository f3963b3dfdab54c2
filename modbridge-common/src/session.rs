use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};

use crate::config::MqttConfig;
use crate::error::Result;

/// Capacity of the client's outgoing request channel.
pub const REQUEST_CAPACITY: usize = 100;

/// Build rumqttc options from the bridge's MQTT configuration.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    options
}

/// Open one MQTT session and wait for the broker to accept it.
///
/// The returned event loop must keep being polled for the client's
/// publishes to reach the broker.
pub async fn connect(config: &MqttConfig) -> Result<(AsyncClient, EventLoop)> {
    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %config.client_id,
        "Connecting to MQTT broker"
    );

    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
    await_connack(&mut eventloop).await?;

    tracing::info!(host = %config.host, port = config.port, "Connected to MQTT broker");

    Ok((client, eventloop))
}

/// Drive the event loop until the broker acknowledges the connection.
///
/// A refused connection surfaces as an error from the event loop.
pub async fn await_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            tracing::debug!(code = ?ack.code, "MQTT connection acknowledged");
            return Ok(());
        }
    }
}
