//! Modbus device polling and state publishing.
//!
//! A cycle visits every configured device: open a session, read and decode
//! each register in schema order, publish every value (absent included) to
//! its state topic, close the session. Device failures stay local to the
//! device; the next cycle is the retry.

use std::sync::Arc;

use modbridge_common::TopicBuilder;
use modbridge_framework::MessageSink;
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use crate::config::{DeviceConfig, ModbusConfig, PollStrategy};
use crate::decoder::{DecodedValue, decode};
use crate::schema::RegisterDescriptor;
use crate::transport::{RegisterSession, RegisterTransport};

/// Error type for polling operations.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Read failed: {0}")]
    Read(String),
}

/// Counters for one device in one cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    /// State messages queued for publishing
    pub published: usize,
    /// Registers whose value was absent (pseudo-registers included)
    pub absent: usize,
    /// Register reads that failed
    pub read_failures: usize,
    /// State messages that could not be queued
    pub publish_failures: usize,
}

/// What happened to one device during a cycle.
#[derive(Debug)]
pub enum DeviceOutcome {
    /// The session opened and every register was processed.
    Polled(DeviceStats),
    /// The session could not be opened; nothing was read or published.
    Unreachable(PollerError),
}

/// Outcome for one named device.
#[derive(Debug)]
pub struct DeviceReport {
    pub device: String,
    pub outcome: DeviceOutcome,
}

/// Result of one poll cycle, in device configuration order.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub devices: Vec<DeviceReport>,
}

impl CycleReport {
    /// Names of devices that could not be reached.
    pub fn unreachable(&self) -> impl Iterator<Item = &str> {
        self.devices
            .iter()
            .filter(|r| matches!(r.outcome, DeviceOutcome::Unreachable(_)))
            .map(|r| r.device.as_str())
    }

    /// Total state messages published across all devices.
    pub fn published(&self) -> usize {
        self.devices
            .iter()
            .map(|r| match &r.outcome {
                DeviceOutcome::Polled(stats) => stats.published,
                DeviceOutcome::Unreachable(_) => 0,
            })
            .sum()
    }

    /// Stats for `device`, if it was reached.
    pub fn stats(&self, device: &str) -> Option<DeviceStats> {
        self.devices.iter().find(|r| r.device == device).and_then(|r| match r.outcome {
            DeviceOutcome::Polled(stats) => Some(stats),
            DeviceOutcome::Unreachable(_) => None,
        })
    }

    fn log(&self) {
        for report in &self.devices {
            match &report.outcome {
                DeviceOutcome::Unreachable(e) => {
                    error!(device = %report.device, error = %e, "Failed to connect to device");
                }
                DeviceOutcome::Polled(stats) => {
                    debug!(
                        device = %report.device,
                        published = stats.published,
                        absent = stats.absent,
                        read_failures = stats.read_failures,
                        publish_failures = stats.publish_failures,
                        "Device polled"
                    );
                }
            }
        }
    }
}

/// Polls every configured device and publishes register values.
pub struct Poller<T, S> {
    config: Arc<ModbusConfig>,
    topics: TopicBuilder,
    transport: T,
    sink: S,
}

impl<T: Clone, S: Clone> Clone for Poller<T, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            topics: self.topics.clone(),
            transport: self.transport.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<T: RegisterTransport, S: MessageSink> Poller<T, S> {
    /// Create a poller over `config`'s devices and registers.
    pub fn new(config: Arc<ModbusConfig>, topics: TopicBuilder, transport: T, sink: S) -> Self {
        Self {
            config,
            topics,
            transport,
            sink,
        }
    }

    /// Run the polling loop forever.
    pub async fn run(self) {
        let interval = self.config.poll_interval();

        tracing::info!(
            devices = self.config.devices.len(),
            registers = self.config.registers.len(),
            interval_ms = self.config.poll_interval_ms,
            strategy = ?self.config.strategy,
            "Starting Modbus poller"
        );

        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let report = self.poll_cycle().await;
            report.log();
            trace!(cycle, published = report.published(), "Poll cycle complete");

            tokio::time::sleep(interval).await;
        }
    }

    /// Perform a single poll cycle over all devices.
    pub async fn poll_cycle(&self) -> CycleReport {
        let devices = match self.config.strategy {
            PollStrategy::Sequential => {
                let mut reports = Vec::with_capacity(self.config.devices.len());
                for device in &self.config.devices {
                    reports.push(DeviceReport {
                        device: device.name.clone(),
                        outcome: self.poll_device(device).await,
                    });
                }
                reports
            }
            PollStrategy::Concurrent => self.poll_concurrently().await,
        };

        CycleReport { devices }
    }

    /// One task per device; results are put back in configuration order.
    async fn poll_concurrently(&self) -> Vec<DeviceReport> {
        let mut tasks = JoinSet::new();

        for (index, device) in self.config.devices.iter().enumerate() {
            let poller = self.clone();
            let device = device.clone();
            tasks.spawn(async move {
                let outcome = poller.poll_device(&device).await;
                (
                    index,
                    DeviceReport {
                        device: device.name,
                        outcome,
                    },
                )
            });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Device poll task failed"),
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    /// Poll every register of one device.
    async fn poll_device(&self, device: &DeviceConfig) -> DeviceOutcome {
        let mut session = match self.transport.open(device, self.config.timeout()).await {
            Ok(session) => session,
            Err(e) => return DeviceOutcome::Unreachable(e),
        };

        let mut stats = DeviceStats::default();

        for register in &self.config.registers {
            let value = match register.read_request() {
                Some((address, count)) => match session.read_words(address, count).await {
                    Ok(raw) => decode(&raw, register),
                    Err(e) => {
                        warn!(
                            device = %device.name,
                            register = %register.id,
                            error = %e,
                            "Failed to read register"
                        );
                        stats.read_failures += 1;
                        DecodedValue::Absent
                    }
                },
                None => DecodedValue::Absent,
            };

            if value.is_absent() {
                stats.absent += 1;
            }

            match self.publish_state(device, register, &value).await {
                Ok(()) => stats.published += 1,
                Err(e) => {
                    warn!(device = %device.name, register = %register.id, error = %e, "Failed to publish state");
                    stats.publish_failures += 1;
                }
            }
        }

        session.close().await;

        DeviceOutcome::Polled(stats)
    }

    /// Publish a value's text form to the register's state topic.
    async fn publish_state(
        &self,
        device: &DeviceConfig,
        register: &RegisterDescriptor,
        value: &DecodedValue,
    ) -> modbridge_framework::Result<()> {
        let topic = self.topics.state(&device.name, register.slug());
        self.sink
            .publish(&topic, value.to_string().into_bytes(), false)
            .await?;
        trace!(%topic, %value, "Published state");
        Ok(())
    }
}
