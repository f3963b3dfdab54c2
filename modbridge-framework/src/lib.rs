//! modbridge Bridge Framework
//!
//! Common abstractions for building bridges that publish device telemetry to MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`MessageSink`] and its MQTT implementation [`Publisher`]
//! - [`supervisor`] for the bounded-retry broker connection and background dispatch
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use modbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Spawn protocol-specific workers
//!     let publisher = runner.publisher();
//!     runner.spawn(my_worker(publisher));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
pub mod supervisor;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{MessageSink, PublishStats, Publisher};
pub use runner::BridgeRunner;
pub use supervisor::RetryPolicy;

// Re-export commonly used types from modbridge-common
pub use modbridge_common::{LogFormat, LoggingConfig, MqttConfig, TopicBuilder};
