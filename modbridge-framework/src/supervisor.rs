//! Broker connection supervision.
//!
//! The broker is a single shared dependency, so startup blocks on it with a
//! bounded retry budget and gives up for good when the budget is spent.
//! Once connected, the event loop runs in a background task for the life of
//! the process; rumqttc reconnects on its own after transient errors.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop};
use tokio::task::JoinHandle;

use modbridge_common::MqttConfig;

use crate::error::{BridgeError, Result};

/// Pause after an event loop error before polling again.
const DISPATCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Bounded retry policy: a fixed number of attempts with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Policy described by the MQTT section of the configuration.
    pub fn from_mqtt(config: &MqttConfig) -> Self {
        Self::new(config.connect_retries, config.retry_delay())
    }

    /// Run `attempt` until it succeeds or the budget is exhausted.
    ///
    /// `attempt` receives the 1-based attempt number. The error of the last
    /// attempt is returned on exhaustion.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut attempt: F) -> std::result::Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;

        loop {
            tracing::info!(peer = %what, attempt = n, max_attempts, "Attempting to connect");

            match attempt(n).await {
                Ok(value) => {
                    tracing::info!(peer = %what, attempt = n, "Connected");
                    return Ok(value);
                }
                Err(e) if n < max_attempts => {
                    tracing::error!(peer = %what, attempt = n, error = %e, "Connection failed");
                    tracing::info!(
                        peer = %what,
                        delay_secs = self.delay.as_secs_f64(),
                        "Retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    n += 1;
                }
                Err(e) => {
                    tracing::error!(
                        peer = %what,
                        attempts = n,
                        error = %e,
                        "Max retries reached, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

/// Connect to the broker, retrying per the configured policy.
///
/// Each attempt opens a fresh session. On exhaustion the last error is
/// reported as [`BridgeError::MqttConnection`], which callers treat as fatal.
pub async fn connect_with_retry(config: &MqttConfig) -> Result<(AsyncClient, EventLoop)> {
    let what = format!("mqtt://{}:{}", config.host, config.port);

    RetryPolicy::from_mqtt(config)
        .retry(&what, |_| modbridge_common::connect(config))
        .await
        .map_err(|e| BridgeError::MqttConnection(format!("{}: {}", what, e)))
}

/// Keep polling the event loop in a background task.
///
/// This flushes queued publishes, answers keep-alive pings and reconnects
/// after errors. The task runs until aborted.
pub fn spawn_dispatch(mut eventloop: EventLoop) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(event) => tracing::trace!(?event, "MQTT event"),
                Err(e) => {
                    tracing::warn!(error = %e, "MQTT event loop error, reconnecting");
                    tokio::time::sleep(DISPATCH_ERROR_BACKOFF).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: std::result::Result<(), String> = fast_policy(5)
            .retry("broker", |n| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("attempt {} refused", n))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(result, Err("attempt 5 refused".to_string()));
    }

    #[tokio::test]
    async fn test_retry_stops_at_first_success() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: std::result::Result<u32, String> = fast_policy(5)
            .retry("broker", |n| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if n < 3 { Err("refused".to_string()) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: std::result::Result<(), &str> = fast_policy(0)
            .retry("broker", |_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("refused")
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_mqtt_config() {
        let mut config = MqttConfig::new("localhost");
        config.connect_retries = 3;
        config.retry_delay_secs = 2;

        assert_eq!(
            RetryPolicy::from_mqtt(&config),
            RetryPolicy::new(3, Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_connect_with_retry_fails_on_unreachable_broker() {
        let mut config = MqttConfig::new("127.0.0.1");
        // Nothing listens on port 1.
        config.port = 1;
        config.connect_retries = 2;
        config.retry_delay_secs = 0;

        let result = connect_with_retry(&config).await;
        assert!(matches!(result, Err(BridgeError::MqttConnection(_))));
    }
}
