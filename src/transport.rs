//! # Probe Transport Layer
//!
//! This module provides transport layer implementations for talking to a
//! measurement device, supporting both a serial line and a WebSocket gateway
//! with a unified interface.
//!
//! ## Supported Transports
//!
//! ### Serial line (`SerialTransport`)
//! - Point-to-point byte stream (USB serial, RS-232)
//! - CR/LF terminated command frames, line-oriented responses
//! - Input-buffer reset before every write to drop stale bytes
//! - Permissive decoding: malformed byte sequences are substituted, not fatal
//!
//! ### WebSocket gateway (`WsTransport`)
//! - Message-relay gateway reached by URL
//! - One JSON envelope `{"cmd": ...}` per command, one envelope
//!   `{"cmd": ..., "payload": ...}` per response
//! - Unparseable envelopes are framing failures, distinct from payload
//!   grammar failures
//!
//! ## Usage Examples
//!
//! ### Serial transport
//!
//! ```rust,no_run
//! use voltage_probe::transport::{ProbeTransport, SerialConfig, SerialTransport};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SerialConfig::new("/dev/ttyUSB0")
//!         .baud_rate(9600)
//!         .timeout(Duration::from_secs(1));
//!     let mut transport = SerialTransport::new_with_config(config)?;
//!
//!     transport.write_frame("GET_V").await?;
//!     let frame = transport.read_frame().await?;
//!     println!("Frame: {:?}", frame);
//!
//!     let stats = transport.get_stats();
//!     println!("Requests sent: {}", stats.requests_sent);
//!
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### WebSocket transport
//!
//! ```rust,no_run
//! use voltage_probe::transport::{ProbeTransport, WsTransport};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = WsTransport::connect(
//!         "ws://localhost:8765",
//!         Duration::from_secs(2),
//!     ).await?;
//!
//!     transport.write_frame("GET_S").await?;
//!     let frame = transport.read_frame().await?;
//!     println!("Frame: {:?}", frame);
//!
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{ProbeError, ProbeResult};
use crate::protocol::{CommandEnvelope, ResponseEnvelope};

/// Default baud rate for serial devices
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout for the serial transport
pub const DEFAULT_SERIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default read timeout for the WebSocket transport
pub const DEFAULT_WS_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum accepted response line length on the serial transport
const MAX_LINE_LENGTH: usize = 256;

/// Command frame terminator on the serial transport
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log packet with direction and transport tag
fn log_packet(direction: &str, data: &[u8], protocol: &str) {
    info!("[PROBE-{}] {} {}", protocol, direction, format_hex_packet(data));
}

/// Log a text frame with direction
fn log_text_frame(direction: &str, text: &str) {
    info!("[PROBE-WS] {} {}", direction, text);
}

/// One unit of wire-level data produced by `read_frame`
///
/// The two transports frame responses differently; this is the only place
/// the difference remains visible. The protocol layer consumes it in exactly
/// one spot and everything above it sees a cleaned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A terminated text line from the serial transport (lossy UTF-8 decoded)
    Line(String),
    /// A decoded message envelope from the WebSocket transport
    Envelope(ResponseEnvelope),
}

/// Transport layer abstraction for device communication
///
/// This trait defines a common interface for the different channels a
/// measurement device can be reached through, allowing the same protocol
/// code to work with a serial line, a WebSocket gateway, or future
/// transport types. Callers depend only on this capability set, never on
/// the concrete variant.
///
/// ## Thread Safety
///
/// All implementations must be `Send + Sync`. A transport is exclusively
/// owned by the client that opened it; exactly one request is outstanding
/// at any time, enforced by `&mut self` on the exchange methods.
///
/// ## Error Handling
///
/// All methods return `ProbeResult<T>`. Per-request failures (timeout,
/// framing) leave the connection open; open failures and peer closes are
/// fatal to the instance.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Send one command frame
    ///
    /// Encodes the command token into the transport's wire form and writes
    /// it as a single frame.
    async fn write_frame(&mut self, command: &str) -> ProbeResult<()>;

    /// Receive one response frame
    ///
    /// Blocks until a frame arrives or the configured read timeout elapses.
    /// An empty read is a timeout, never an empty valid response.
    async fn read_frame(&mut self) -> ProbeResult<RawFrame>;

    /// Check if the transport connection is active
    ///
    /// This is a local check and does not verify that the remote device is
    /// responsive.
    fn is_open(&self) -> bool;

    /// Close the transport connection gracefully
    ///
    /// Safe to call when already closed.
    async fn close(&mut self) -> ProbeResult<()>;

    /// Get communication statistics
    fn get_stats(&self) -> TransportStats;
}

/// Transport layer statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Configuration for the serial transport
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout
    pub timeout: Duration,
}

impl SerialConfig {
    /// Create a new serial configuration with default settings
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_SERIAL_TIMEOUT,
        }
    }

    /// Set the baud rate
    pub fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Set the read timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial line transport implementation
pub struct SerialTransport {
    /// Serial port connection
    port: Option<SerialStream>,
    /// Transport configuration
    config: SerialConfig,
    /// Transport statistics
    stats: TransportStats,
    /// Enable packet logging for debugging
    packet_logging: bool,
}

impl SerialTransport {
    /// Create a new serial transport and open the port
    ///
    /// Uses the default read timeout. Fails fast with
    /// `ProbeError::Connection` if the port cannot be acquired.
    pub fn new(port: &str, baud_rate: u32) -> ProbeResult<Self> {
        Self::new_with_config(SerialConfig::new(port).baud_rate(baud_rate))
    }

    /// Create a new serial transport with full configuration
    pub fn new_with_config(config: SerialConfig) -> ProbeResult<Self> {
        let mut transport = Self {
            port: None,
            config,
            stats: TransportStats::default(),
            packet_logging: false,
        };

        // Open immediately so an unreachable device fails fast
        transport.connect()?;

        Ok(transport)
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    /// Get the configured port path
    pub fn port_name(&self) -> &str {
        &self.config.port
    }

    /// Open the serial port
    fn connect(&mut self) -> ProbeResult<()> {
        let builder = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.timeout);

        let port = SerialStream::open(&builder).map_err(|e| {
            ProbeError::connection(format!(
                "Failed to open serial port {}: {}",
                self.config.port, e
            ))
        })?;

        self.port = Some(port);
        info!("connected to serial port {}", self.config.port);

        Ok(())
    }
}

#[async_trait]
impl ProbeTransport for SerialTransport {
    async fn write_frame(&mut self, command: &str) -> ProbeResult<()> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ProbeError::connection("Serial port is not open"))?;

        // Discard unread bytes from a prior exchange so stale data cannot
        // contaminate the next read
        port.clear(ClearBuffer::Input)?;
        debug!("serial input buffer cleared");

        let mut frame = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(LINE_TERMINATOR);

        match timeout(self.config.timeout, port.write_all(&frame)).await {
            Ok(Ok(())) => {
                // Flush to ensure data is sent
                let _ = timeout(self.config.timeout, port.flush()).await;
            }
            Ok(Err(e)) => {
                self.stats.errors += 1;
                return Err(ProbeError::io(format!("Failed to send command: {}", e)));
            }
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(ProbeError::timeout("send command", timeout_ms));
            }
        }

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        if self.packet_logging {
            log_packet("send", &frame, "SERIAL");
        }

        Ok(())
    }

    async fn read_frame(&mut self) -> ProbeResult<RawFrame> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let deadline = Instant::now() + self.config.timeout;
        let mut buf = BytesMut::with_capacity(64);

        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ProbeError::connection("Serial port is not open"))?;

        let mut byte = [0u8; 1];

        // Read until line terminator or deadline; a partial line at the
        // deadline is still handed to validation
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };

            match timeout(remaining, port.read(&mut byte)).await {
                Ok(Ok(0)) => {
                    self.stats.errors += 1;
                    return Err(ProbeError::connection("Serial port closed"));
                }
                Ok(Ok(_)) => {
                    buf.extend_from_slice(&byte);

                    if byte[0] == b'\n' {
                        break;
                    }

                    if buf.len() > MAX_LINE_LENGTH {
                        self.stats.errors += 1;
                        return Err(ProbeError::protocol("Response line too long"));
                    }
                }
                Ok(Err(e)) => {
                    self.stats.errors += 1;
                    return Err(ProbeError::io(format!("Serial read error: {}", e)));
                }
                Err(_) => break,
            }
        }

        if buf.is_empty() {
            self.stats.timeouts += 1;
            self.stats.errors += 1;
            return Err(ProbeError::timeout("read response line", timeout_ms));
        }

        self.stats.responses_received += 1;
        self.stats.bytes_received += buf.len() as u64;

        if self.packet_logging {
            log_packet("receive", &buf, "SERIAL");
        }

        // Permissive decode: garbage bytes are substituted and left for
        // grammar validation to reject
        let line = String::from_utf8_lossy(&buf).into_owned();

        Ok(RawFrame::Line(line))
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if let Some(_port) = self.port.take() {
            // SerialStream releases the port handle on drop
            info!("closed serial port {}", self.config.port);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// Configuration for the WebSocket transport
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket endpoint URL (e.g., "ws://localhost:8765")
    pub url: String,
    /// Read timeout
    pub timeout: Duration,
}

impl WsConfig {
    /// Create a new WebSocket configuration with default settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_WS_TIMEOUT,
        }
    }

    /// Set the read timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// WebSocket gateway transport implementation
pub struct WsTransport {
    /// WebSocket connection
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    /// Transport configuration
    config: WsConfig,
    /// Transport statistics
    stats: TransportStats,
    /// Enable packet logging for debugging
    packet_logging: bool,
}

impl WsTransport {
    /// Connect to a WebSocket endpoint
    ///
    /// The connect attempt itself is bounded by the same timeout used for
    /// reads; failure is `ProbeError::Connection` and fatal.
    pub async fn connect(url: &str, timeout: Duration) -> ProbeResult<Self> {
        Self::connect_with_config(WsConfig::new(url).timeout(timeout)).await
    }

    /// Connect with full configuration
    pub async fn connect_with_config(config: WsConfig) -> ProbeResult<Self> {
        let timeout_ms = config.timeout.as_millis() as u64;

        let (stream, _response) =
            match timeout(config.timeout, connect_async(config.url.as_str())).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    return Err(ProbeError::connection(format!(
                        "Failed to connect to {}: {}",
                        config.url, e
                    )));
                }
                Err(_) => {
                    return Err(ProbeError::connection(format!(
                        "Timed out connecting to {} after {}ms",
                        config.url, timeout_ms
                    )));
                }
            };

        info!("connected to WebSocket endpoint {}", config.url);

        Ok(Self {
            stream: Some(stream),
            config,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    /// Get the configured endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl ProbeTransport for WsTransport {
    async fn write_frame(&mut self, command: &str) -> ProbeResult<()> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProbeError::connection("WebSocket is not open"))?;

        let json = CommandEnvelope::new(command).to_json()?;
        let frame_len = json.len() as u64;

        if self.packet_logging {
            log_text_frame("send", &json);
        }

        match timeout(self.config.timeout, stream.send(Message::Text(json))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stats.errors += 1;
                return Err(e.into());
            }
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(ProbeError::timeout("send command envelope", timeout_ms));
            }
        }

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame_len;

        Ok(())
    }

    async fn read_frame(&mut self) -> ProbeResult<RawFrame> {
        let timeout_ms = self.config.timeout.as_millis() as u64;
        let deadline = Instant::now() + self.config.timeout;

        // Control frames (ping/pong) may interleave; keep reading until a
        // data frame or the deadline
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                self.stats.timeouts += 1;
                self.stats.errors += 1;
                return Err(ProbeError::timeout("read response envelope", timeout_ms));
            };

            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| ProbeError::connection("WebSocket is not open"))?;

            let message = match timeout(remaining, stream.next()).await {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(e))) => {
                    self.stats.errors += 1;
                    return Err(e.into());
                }
                Ok(None) => {
                    self.stream = None;
                    return Err(ProbeError::connection("WebSocket closed by peer"));
                }
                Err(_) => {
                    self.stats.timeouts += 1;
                    self.stats.errors += 1;
                    return Err(ProbeError::timeout("read response envelope", timeout_ms));
                }
            };

            match message {
                Message::Text(text) => {
                    self.stats.responses_received += 1;
                    self.stats.bytes_received += text.len() as u64;

                    if self.packet_logging {
                        log_text_frame("receive", &text);
                    }

                    let envelope = match ResponseEnvelope::from_json(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            self.stats.errors += 1;
                            return Err(e);
                        }
                    };

                    return Ok(RawFrame::Envelope(envelope));
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    self.stream = None;
                    return Err(ProbeError::connection("WebSocket closed by peer"));
                }
                other => {
                    self.stats.errors += 1;
                    return Err(ProbeError::protocol(format!(
                        "Unexpected WebSocket frame: {:?}",
                        other
                    )));
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if let Some(mut stream) = self.stream.take() {
            // Best-effort close handshake; the socket is dropped either way
            let _ = stream.close(None).await;
            info!("closed WebSocket endpoint {}", self.config.url);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout, DEFAULT_SERIAL_TIMEOUT);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0")
            .baud_rate(115_200)
            .timeout(Duration::from_millis(500));
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_ws_config_defaults() {
        let config = WsConfig::new("ws://localhost:8765");
        assert_eq!(config.url, "ws://localhost:8765");
        assert_eq!(config.timeout, DEFAULT_WS_TIMEOUT);
    }

    #[test]
    fn test_serial_open_failure_is_connection_error() {
        let result = SerialTransport::new("/dev/probe-port-that-does-not-exist", 9600);
        match result {
            Err(ProbeError::Connection { message }) => {
                assert!(message.contains("/dev/probe-port-that-does-not-exist"));
            }
            other => panic!("expected connection error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_ws_connect_refused_is_connection_error() {
        // Discard port; nothing listens there
        let result = WsTransport::connect("ws://127.0.0.1:9", Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ProbeError::Connection { .. })));
    }

    #[test]
    fn test_format_hex_packet() {
        assert_eq!(format_hex_packet(b"GET_V\r\n"), "47 45 54 5F 56 0D 0A");
        assert_eq!(format_hex_packet(&[]), "");
    }
}
