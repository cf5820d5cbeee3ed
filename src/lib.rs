//! # Voltage Probe - Measurement Device Query Library
//!
//! **Author:** Evan Liu <evan.liu@voltageenergy.com>
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! A uniform client for querying measurement devices from test harnesses,
//! whether the device is reached over a point-to-point serial line or
//! through a JSON-enveloped WebSocket gateway.
//!
//! ## Features
//!
//! - **🔌 Two Transports, One Contract**: serial line and WebSocket gateway
//!   behind a single trait
//! - **🚀 Async/Await**: Tokio-based, one blocking exchange at a time
//! - **🛡️ Validated Responses**: every value is cleaned and checked against
//!   a fixed per-metric grammar before it reaches the caller
//! - **🔎 Classified Failures**: connection-fatal and per-request errors are
//!   distinct types, not strings
//! - **📊 Built-in Monitoring**: per-transport exchange statistics
//!
//! ## Supported Commands
//!
//! | Token | Metric | Response grammar |
//! |-------|--------|------------------|
//! | `GET_V` | Voltage | `V_` digits `V` (e.g. `V_12V`) |
//! | `GET_A` | Current | `A_` digits `A` (e.g. `A_5A`) |
//! | `GET_S` | Serial number | `S_` [A-Z0-9]+ (e.g. `S_ABC123`) |
//!
//! ## Quick Start
//!
//! ### Serial device
//!
//! ```rust,no_run
//! use voltage_probe::{ProbeClient, SerialProbeClient, ProbeResult};
//!
//! #[tokio::main]
//! async fn main() -> ProbeResult<()> {
//!     // Opens the port immediately; unreachable devices fail fast
//!     let mut client = SerialProbeClient::new("/dev/ttyUSB0")?;
//!
//!     let voltage = client.get_voltage().await?;
//!     let current = client.get_ampere().await?;
//!     println!("Voltage: {}, Current: {}", voltage, current);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### WebSocket gateway
//!
//! ```rust,no_run
//! use voltage_probe::{ProbeClient, WsProbeClient, ProbeResult};
//!
//! #[tokio::main]
//! async fn main() -> ProbeResult<()> {
//!     let mut client = WsProbeClient::connect("ws://localhost:8765").await?;
//!
//!     let serial = client.get_serial().await?;
//!     println!("Serial number: {}", serial);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │  SerialProbeClient  │   │    WsProbeClient    │
//! └─────────────────────┘   └─────────────────────┘
//!            │                         │
//! ┌─────────────────────────────────────────────────┐
//! │        GenericProbeClient (protocol layer)      │
//! │   token lookup · exchange · clean · validate    │
//! └─────────────────────────────────────────────────┘
//!            │                         │
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │   SerialTransport   │   │     WsTransport     │
//! │   <TOKEN>\r\n line  │   │   {"cmd": ...} JSON │
//! └─────────────────────┘   └─────────────────────┘
//! ```

/// Core error types and result handling
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod error;

/// Protocol definitions: metrics, command table, envelopes, grammars
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod protocol;

/// Transport layer for serial line and WebSocket communication
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod transport;

/// Probe client implementations
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod client;

/// Callback logging system for host applications
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod logging;

/// Utility functions and performance monitoring
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod utils;

// Re-export main types for convenience
pub use client::{scoped, GenericProbeClient, ProbeClient, SerialProbeClient, WsProbeClient};
pub use error::{ProbeError, ProbeResult};
pub use logging::{CallbackLogger, LogCallback, LogLevel};
pub use protocol::{
    clean_response, is_valid_command, valid_commands, validate_response, CommandEnvelope, Metric,
    ResponseEnvelope,
};
pub use transport::{
    ProbeTransport, RawFrame, SerialConfig, SerialTransport, TransportStats, WsConfig, WsTransport,
};
pub use utils::{OperationTimer, PerformanceMetrics};

/// Default baud rate for serial devices
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default serial read timeout in milliseconds
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 1000;

/// Default WebSocket read timeout in milliseconds
pub const DEFAULT_WS_TIMEOUT_MS: u64 = 2000;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage Probe v{} - Measurement device query library by Evan Liu",
        VERSION
    )
}
