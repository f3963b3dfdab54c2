//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;

use modbridge_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::supervisor::{connect_with_retry, spawn_dispatch};

/// Grace period for the dispatch loop to flush the DISCONNECT packet.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection with bounded retry (fatal when exhausted)
/// - The background MQTT dispatch loop
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
///
/// # Example
///
/// ```ignore
/// use modbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// The loaded configuration, immutable from here on.
    config: Arc<C>,
    /// Publisher for outgoing messages.
    publisher: Publisher,
    /// Background MQTT event loop.
    dispatch: JoinHandle<()>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging from the config, or from `--log-level` when given
    /// 2. Connect to the MQTT broker, retrying per the config
    /// 3. Start the background dispatch loop and create the publisher
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();

        // Initialize logging with optional CLI override
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config)?;

        tracing::info!(bridge = %name, version = env!("CARGO_PKG_VERSION"), "Starting bridge");

        let (client, eventloop) = connect_with_retry(config.mqtt()).await?;
        let dispatch = spawn_dispatch(eventloop);

        Ok(Self {
            name,
            config: Arc::new(config),
            publisher: Publisher::new(client),
            dispatch,
            tasks: Vec::new(),
        })
    }

    /// Get the shared configuration.
    pub fn config(&self) -> &Arc<C> {
        &self.config
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C is received.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
    }

    /// Run the bridge until `shutdown` completes.
    ///
    /// This will:
    /// 1. Wait for the shutdown future
    /// 2. Abort all spawned tasks
    /// 3. Disconnect from the broker and stop the dispatch loop
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        if let Err(e) = self.publisher.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        tokio::time::sleep(SHUTDOWN_GRACE).await;
        self.dispatch.abort();

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
