//! Message publishing to MQTT.

use std::future::Future;

use rumqttc::{AsyncClient, QoS};
use serde::Serialize;

use crate::error::{BridgeError, Result};

/// Every message is sent at most once.
const PUBLISH_QOS: QoS = QoS::AtMostOnce;

/// Destination for outgoing messages.
///
/// Implementations must be cheap to clone and safe to share between
/// concurrent pollers. Publishing is fire-and-forget: a successful return
/// means the message was queued, not that the broker acknowledged it.
pub trait MessageSink: Clone + Send + Sync + 'static {
    /// Publish a raw payload to `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Serialize `value` as compact JSON and publish it to `topic`.
    fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        value: &T,
        retain: bool,
    ) -> impl Future<Output = Result<()>> + Send {
        let payload = serde_json::to_vec(value);
        async move { self.publish(topic, payload?, retain).await }
    }
}

/// MQTT publisher backed by a rumqttc client.
///
/// The client only queues requests; the event loop spawned by
/// [`supervisor::spawn_dispatch`](crate::supervisor::spawn_dispatch) sends them.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
}

impl Publisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Send a DISCONNECT to the broker.
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::MqttConnection(e.to_string()))
    }
}

impl MessageSink for Publisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .publish(topic, PUBLISH_QOS, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Record the outcome of one publish.
    pub fn record(&mut self, result: &Result<()>) {
        match result {
            Ok(()) => self.success += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        messages: Arc<Mutex<Vec<(String, Vec<u8>, bool)>>>,
    }

    impl MessageSink for Recorder {
        async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload, retain));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_json_is_compact() {
        let sink = Recorder::default();
        let value = serde_json::json!({ "unique_id": "inv1_100" });

        sink.publish_json("ha/sensor/inv1/100/config", &value, true)
            .await
            .unwrap();

        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "ha/sensor/inv1/100/config");
        assert_eq!(messages[0].1, br#"{"unique_id":"inv1_100"}"#.to_vec());
        assert!(messages[0].2);
    }

    #[tokio::test]
    async fn test_publisher_queues_without_broker() {
        let options = rumqttc::MqttOptions::new("test", "localhost", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 10);
        let publisher = Publisher::new(client);

        publisher
            .publish("ha/sensor/inv1/100/state", b"42".to_vec(), false)
            .await
            .unwrap();
    }

    #[test]
    fn test_publish_stats() {
        let mut stats = PublishStats::default();
        assert_eq!(stats.total(), 0);

        for _ in 0..8 {
            stats.record(&Ok(()));
        }
        for _ in 0..2 {
            stats.record(&Err(BridgeError::config("boom")));
        }
        assert_eq!(stats.total(), 10);
        assert_eq!(stats, PublishStats { success: 8, failed: 2 });
    }
}
