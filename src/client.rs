//! High-level probe client implementations
//!
//! This module provides user-friendly client interfaces for querying a
//! measurement device, abstracting away the transport details.
//!
//! The key insight is that the serial line and the WebSocket gateway carry
//! the same logical protocol (command token out, one textual value back),
//! differing only in framing:
//! - Serial: `<TOKEN>\r\n` out, one terminated line back
//! - WebSocket: `{"cmd": <TOKEN>}` out, `{"cmd": <TOKEN>, "payload": <value>}` back
//!
//! This allows us to implement the command/response logic once and reuse it
//! for both transports.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use voltage_probe::{ProbeClient, SerialProbeClient, ProbeResult};
//!
//! #[tokio::main]
//! async fn main() -> ProbeResult<()> {
//!     let mut client = SerialProbeClient::new("/dev/ttyUSB0")?;
//!
//!     let voltage = client.get_voltage().await?;
//!     println!("Voltage: {}", voltage);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{ProbeError, ProbeResult};
use crate::logging::CallbackLogger;
use crate::protocol::{clean_response, is_valid_command, valid_commands, validate_response, Metric};
use crate::transport::{
    ProbeTransport, RawFrame, SerialConfig, SerialTransport, TransportStats, WsConfig, WsTransport,
};
use crate::utils::validation;

/// Trait defining the interface for probe client operations
///
/// Each query method blocks the calling task until a response arrives or
/// the configured timeout elapses; there is no background task and no
/// retry. Exactly one request is outstanding per client at any time.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    /// Query the supply voltage (`GET_V`)
    async fn get_voltage(&mut self) -> ProbeResult<String>;

    /// Query the supply current (`GET_A`)
    async fn get_ampere(&mut self) -> ProbeResult<String>;

    /// Query the device serial number (`GET_S`)
    async fn get_serial(&mut self) -> ProbeResult<String>;

    /// Send a raw command token and return the cleaned response
    ///
    /// The token is checked against the known command set before anything
    /// is written to the transport; the returned value is cleaned but NOT
    /// grammar-validated; that is the caller's responsibility.
    async fn send_command(&mut self, token: &str) -> ProbeResult<String>;

    /// Check if the client connection is open
    fn is_open(&self) -> bool;

    /// Close the client connection
    ///
    /// Idempotent: calling close on an already-closed client is a no-op.
    async fn close(&mut self) -> ProbeResult<()>;

    /// Get transport statistics
    fn get_stats(&self) -> TransportStats;
}

/// Run a closure against a client, then always close it
///
/// The guaranteed-release pattern for scoped use: the client is consumed,
/// the closure's future runs against it, and `close` is invoked afterwards
/// on both the normal and the error path. A failure inside the scope takes
/// precedence over a failure to close.
///
/// ```rust,no_run
/// use voltage_probe::{client, ProbeClient, SerialProbeClient, ProbeResult};
///
/// #[tokio::main]
/// async fn main() -> ProbeResult<()> {
///     let probe = SerialProbeClient::new("/dev/ttyUSB0")?;
///     let voltage = client::scoped(probe, |c| {
///         Box::pin(async move { c.get_voltage().await })
///     })
///     .await?;
///     println!("Voltage: {}", voltage);
///     Ok(())
/// }
/// ```
pub async fn scoped<C, R, F>(mut client: C, f: F) -> ProbeResult<R>
where
    C: ProbeClient,
    R: Send,
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ProbeResult<R>> + Send,
{
    let result = f(&mut client).await;
    let close_result = client.close().await;

    match result {
        Ok(value) => {
            close_result?;
            Ok(value)
        }
        Err(err) => Err(err),
    }
}

/// Generic probe client that works with any transport
///
/// This client implements the command/response protocol once (token lookup,
/// single write/read exchange, response cleaning, envelope echo checking,
/// grammar validation) while delegating framing to the underlying transport.
pub struct GenericProbeClient<T: ProbeTransport> {
    transport: T,
    logger: Option<CallbackLogger>,
}

impl<T: ProbeTransport> GenericProbeClient<T> {
    /// Create a new generic client with the specified transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            logger: None,
        }
    }

    /// Create a new generic client with logging
    pub fn with_logger(transport: T, logger: CallbackLogger) -> Self {
        Self {
            transport,
            logger: Some(logger),
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Execute one command/response exchange and return the cleaned response
    ///
    /// Exactly one write and one read per call; the response is correlated
    /// to the request purely by arrival order. Never retries.
    async fn exchange(&mut self, token: &str) -> ProbeResult<String> {
        if !self.transport.is_open() {
            return Err(ProbeError::connection("Connection is not open"));
        }

        if let Some(ref logger) = self.logger {
            logger.log_command(token);
        }

        self.transport.write_frame(token).await?;
        let frame = self.transport.read_frame().await?;

        let cleaned = match frame {
            RawFrame::Line(raw) => clean_response(&raw),
            RawFrame::Envelope(envelope) => {
                // The gateway must echo the token it answers; a mismatch
                // means the envelope belongs to a different request
                if envelope.cmd != token {
                    return Err(ProbeError::protocol(format!(
                        "Echoed command mismatch: sent {}, received {}",
                        token, envelope.cmd
                    )));
                }
                clean_response(&envelope.payload)
            }
        };

        if let Some(ref logger) = self.logger {
            logger.log_response(token, &cleaned);
        }

        Ok(cleaned)
    }

    /// Query one metric and validate the response against its grammar
    pub async fn query(&mut self, metric: Metric) -> ProbeResult<String> {
        let cleaned = self.exchange(metric.command()).await?;

        if !validate_response(metric, &cleaned) {
            return Err(ProbeError::validation(metric.name(), cleaned));
        }

        Ok(cleaned)
    }
}

#[async_trait]
impl<T: ProbeTransport + Send + Sync> ProbeClient for GenericProbeClient<T> {
    async fn get_voltage(&mut self) -> ProbeResult<String> {
        self.query(Metric::Voltage).await
    }

    async fn get_ampere(&mut self) -> ProbeResult<String> {
        self.query(Metric::Ampere).await
    }

    async fn get_serial(&mut self) -> ProbeResult<String> {
        self.query(Metric::Serial).await
    }

    async fn send_command(&mut self, token: &str) -> ProbeResult<String> {
        if !is_valid_command(token) {
            return Err(ProbeError::invalid_command(token, valid_commands()));
        }

        self.exchange(token).await
    }

    fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

/// Probe client over a serial line
pub struct SerialProbeClient {
    inner: GenericProbeClient<SerialTransport>,
}

impl SerialProbeClient {
    /// Create a new serial client with default settings (9600 baud, 1s timeout)
    ///
    /// The port is opened during construction; an unreachable device fails
    /// fast with `ProbeError::Connection`.
    pub fn new(port: &str) -> ProbeResult<Self> {
        Self::with_config(SerialConfig::new(port))
    }

    /// Create a new serial client with an explicit baud rate
    pub fn with_baud_rate(port: &str, baud_rate: u32) -> ProbeResult<Self> {
        Self::with_config(SerialConfig::new(port).baud_rate(baud_rate))
    }

    /// Create a new serial client with full configuration
    pub fn with_config(config: SerialConfig) -> ProbeResult<Self> {
        validation::validate_baud_rate(config.baud_rate)?;
        validation::validate_timeout(config.timeout)?;

        let transport = SerialTransport::new_with_config(config)?;
        Ok(Self {
            inner: GenericProbeClient::new(transport),
        })
    }

    /// Create a new serial client with logging
    pub fn with_logging(
        config: SerialConfig,
        logger: Option<CallbackLogger>,
    ) -> ProbeResult<Self> {
        validation::validate_baud_rate(config.baud_rate)?;
        validation::validate_timeout(config.timeout)?;

        let transport = SerialTransport::new_with_config(config)?;
        let logger = logger.unwrap_or_default();
        Ok(Self {
            inner: GenericProbeClient::with_logger(transport, logger),
        })
    }

    /// Create from an existing transport
    pub fn from_transport(transport: SerialTransport) -> Self {
        Self {
            inner: GenericProbeClient::new(transport),
        }
    }

    /// Get the configured port path
    pub fn port_name(&self) -> &str {
        self.inner.transport().port_name()
    }

    /// Enable or disable packet logging on an existing client
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.inner.transport_mut().set_packet_logging(enabled);
    }
}

#[async_trait]
impl ProbeClient for SerialProbeClient {
    async fn get_voltage(&mut self) -> ProbeResult<String> {
        self.inner.get_voltage().await
    }

    async fn get_ampere(&mut self) -> ProbeResult<String> {
        self.inner.get_ampere().await
    }

    async fn get_serial(&mut self) -> ProbeResult<String> {
        self.inner.get_serial().await
    }

    async fn send_command(&mut self, token: &str) -> ProbeResult<String> {
        self.inner.send_command(token).await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.inner.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.inner.get_stats()
    }
}

/// Probe client over a WebSocket gateway
pub struct WsProbeClient {
    inner: GenericProbeClient<WsTransport>,
}

impl WsProbeClient {
    /// Connect to a gateway with the default timeout (2s)
    pub async fn connect(url: &str) -> ProbeResult<Self> {
        Self::connect_with_config(WsConfig::new(url)).await
    }

    /// Connect to a gateway with an explicit timeout
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> ProbeResult<Self> {
        Self::connect_with_config(WsConfig::new(url).timeout(timeout)).await
    }

    /// Connect with full configuration
    pub async fn connect_with_config(config: WsConfig) -> ProbeResult<Self> {
        validation::validate_endpoint_url(&config.url)?;
        validation::validate_timeout(config.timeout)?;

        let transport = WsTransport::connect_with_config(config).await?;
        Ok(Self {
            inner: GenericProbeClient::new(transport),
        })
    }

    /// Connect with logging
    pub async fn with_logging(
        config: WsConfig,
        logger: Option<CallbackLogger>,
    ) -> ProbeResult<Self> {
        validation::validate_endpoint_url(&config.url)?;
        validation::validate_timeout(config.timeout)?;

        let transport = WsTransport::connect_with_config(config).await?;
        let logger = logger.unwrap_or_default();
        Ok(Self {
            inner: GenericProbeClient::with_logger(transport, logger),
        })
    }

    /// Create from an existing transport
    pub fn from_transport(transport: WsTransport) -> Self {
        Self {
            inner: GenericProbeClient::new(transport),
        }
    }

    /// Get the configured endpoint URL
    pub fn endpoint(&self) -> &str {
        self.inner.transport().endpoint()
    }

    /// Enable or disable packet logging on an existing client
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.inner.transport_mut().set_packet_logging(enabled);
    }
}

#[async_trait]
impl ProbeClient for WsProbeClient {
    async fn get_voltage(&mut self) -> ProbeResult<String> {
        self.inner.get_voltage().await
    }

    async fn get_ampere(&mut self) -> ProbeResult<String> {
        self.inner.get_ampere().await
    }

    async fn get_serial(&mut self) -> ProbeResult<String> {
        self.inner.get_serial().await
    }

    async fn send_command(&mut self, token: &str) -> ProbeResult<String> {
        self.inner.send_command(token).await
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&mut self) -> ProbeResult<()> {
        self.inner.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.inner.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_client_creation() {
        // Will fail without actual hardware, but must not panic and must
        // classify the failure as a connection error
        let result = SerialProbeClient::new("/dev/ttyUSB0");
        if let Err(err) = result {
            assert!(matches!(err, ProbeError::Connection { .. }));
        }
    }

    #[test]
    fn test_serial_client_rejects_bad_baud_rate() {
        let config = SerialConfig::new("/dev/ttyUSB0").baud_rate(1234);
        let result = SerialProbeClient::with_config(config);
        assert!(matches!(result, Err(ProbeError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_ws_client_rejects_bad_scheme() {
        // Rejected before any connect attempt, so no server is needed
        let result = WsProbeClient::connect("http://localhost:8765").await;
        assert!(matches!(result, Err(ProbeError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_ws_client_rejects_zero_timeout() {
        let config = WsConfig::new("ws://localhost:8765").timeout(Duration::from_secs(0));
        let result = WsProbeClient::connect_with_config(config).await;
        assert!(matches!(result, Err(ProbeError::Configuration { .. })));
    }
}
