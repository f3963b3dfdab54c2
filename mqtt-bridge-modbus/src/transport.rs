//! Register transport: how the poller talks to field devices.
//!
//! [`RegisterTransport`] opens one [`RegisterSession`] per device per cycle.
//! [`ModbusTcpTransport`] is the Modbus TCP implementation; tests substitute
//! in-memory transports.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::{Client, Context, Reader};
use tokio_modbus::prelude::*;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::poller::PollerError;

/// Opens sessions to field devices.
pub trait RegisterTransport: Clone + Send + Sync + 'static {
    type Session: RegisterSession;

    /// Open a session to `device`. Each call is a single attempt.
    fn open(
        &self,
        device: &DeviceConfig,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, PollerError>> + Send;
}

/// An open session to one device.
pub trait RegisterSession: Send {
    /// Read `count` consecutive holding registers starting at `address`.
    fn read_words(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, PollerError>> + Send;

    /// Close the session.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Modbus TCP transport backed by tokio-modbus.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModbusTcpTransport;

/// An open Modbus TCP connection.
pub struct ModbusSession {
    ctx: Context,
    timeout: Duration,
}

impl RegisterTransport for ModbusTcpTransport {
    type Session = ModbusSession;

    async fn open(
        &self,
        device: &DeviceConfig,
        timeout: Duration,
    ) -> Result<ModbusSession, PollerError> {
        let addr = resolve(&device.host, device.port, timeout).await?;
        let slave = Slave(device.unit_id);

        let ctx = tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
            .await
            .map_err(|_| PollerError::Connection("Connection timeout".to_string()))?
            .map_err(|e| PollerError::Connection(e.to_string()))?;

        debug!(device = %device.name, %addr, unit_id = device.unit_id, "Modbus session opened");

        Ok(ModbusSession { ctx, timeout })
    }
}

impl RegisterSession for ModbusSession {
    async fn read_words(&mut self, address: u16, count: u16) -> Result<Vec<u16>, PollerError> {
        tokio::time::timeout(self.timeout, self.ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| PollerError::Read("Read timeout".to_string()))?
            .map_err(|e| PollerError::Read(e.to_string()))?
            .map_err(|e| PollerError::Read(format!("Exception: {:?}", e)))
    }

    async fn close(mut self) {
        if let Err(e) = self.ctx.disconnect().await {
            debug!(error = %e, "Error closing Modbus session");
        }
    }
}

/// Resolve `host:port`, accepting both IP literals and host names.
async fn resolve(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, PollerError> {
    if let Ok(ip) = host.parse() {
        return Ok(SocketAddr::new(ip, port));
    }

    tokio::time::timeout(timeout, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| PollerError::Connection(format!("Timed out resolving '{}'", host)))?
        .map_err(|e| PollerError::Connection(format!("Invalid address '{}': {}", host, e)))?
        .next()
        .ok_or_else(|| PollerError::Connection(format!("No address found for '{}'", host)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one Modbus TCP connection, answering each read with `reply(address, count)`.
    ///
    /// `Err(code)` answers with that exception code.
    async fn serve_registers(reply: fn(u16, u16) -> Result<Vec<u16>, u8>) -> DeviceConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // MBAP header (7 bytes) + function, address, count
            let mut request = [0u8; 12];

            while stream.read_exact(&mut request).await.is_ok() {
                let function = request[7];
                let address = u16::from_be_bytes([request[8], request[9]]);
                let count = u16::from_be_bytes([request[10], request[11]]);

                let pdu = match reply(address, count) {
                    Ok(words) => {
                        let mut pdu = vec![function, (words.len() * 2) as u8];
                        for word in words {
                            pdu.extend_from_slice(&word.to_be_bytes());
                        }
                        pdu
                    }
                    Err(code) => vec![function | 0x80, code],
                };

                let mut frame = request[..4].to_vec();
                frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
                frame.push(request[6]);
                frame.extend_from_slice(&pdu);

                if stream.write_all(&frame).await.is_err() {
                    break;
                }
            }
        });

        DeviceConfig {
            port,
            ..DeviceConfig::new("inv1", "127.0.0.1")
        }
    }

    #[tokio::test]
    async fn test_read_words_returns_holding_registers() {
        let device = serve_registers(|address, count| match (address, count) {
            (100, 1) => Ok(vec![42]),
            (35138, 2) => Ok(vec![0xFFFF, 0xFF38]),
            _ => Err(0x02),
        })
        .await;

        let mut session = ModbusTcpTransport
            .open(&device, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(session.read_words(100, 1).await.unwrap(), vec![42]);
        assert_eq!(
            session.read_words(35138, 2).await.unwrap(),
            vec![0xFFFF, 0xFF38]
        );
        session.close().await;
    }

    #[tokio::test]
    async fn test_read_words_exception_is_read_error() {
        let device = serve_registers(|_, _| Err(0x02)).await;

        let mut session = ModbusTcpTransport
            .open(&device, Duration::from_secs(2))
            .await
            .unwrap();

        match session.read_words(9999, 1).await {
            Err(PollerError::Read(message)) => assert!(message.contains("IllegalDataAddress")),
            other => panic!("Expected read error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_words_times_out_on_silent_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let device = DeviceConfig {
            port,
            ..DeviceConfig::new("inv1", "127.0.0.1")
        };
        let timeout = Duration::from_millis(200);
        let mut session = ModbusTcpTransport.open(&device, timeout).await.unwrap();

        let started = Instant::now();
        let result = session.read_words(100, 1).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        match result {
            Err(PollerError::Read(message)) => assert_eq!(message, "Read timeout"),
            other => panic!("Expected read timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let addr = resolve("192.168.1.10", 502, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(addr, "192.168.1.10:502".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve("localhost", 1502, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 1502);
    }

    #[tokio::test]
    async fn test_open_refused_is_connection_error() {
        let device = DeviceConfig {
            port: 1,
            ..DeviceConfig::new("inv1", "127.0.0.1")
        };

        let result = ModbusTcpTransport
            .open(&device, Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(PollerError::Connection(_))));
    }
}
