//! # Voltage Probe Error Handling
//!
//! This module provides comprehensive error handling for the Voltage Probe library,
//! covering all aspects of device communication including transport setup, the
//! command/response exchange, and response validation.
//!
//! ## Overview
//!
//! The error system is designed to provide clear, actionable error information for
//! different failure scenarios when talking to a measurement device. All errors
//! implement standard Rust error traits and carry enough context (the offending
//! command token or the offending response value) to reproduce a failing exchange.
//!
//! ## Error Categories
//!
//! ### Transport Errors
//! - **I/O Errors**: Raw serial or socket failures underneath a live connection
//! - **Connection Errors**: Open failures, or operations attempted while closed
//! - **Timeout Errors**: No frame arrived within the configured read timeout
//!
//! ### Exchange Errors
//! - **Protocol Errors**: A received frame could not be parsed into the expected
//!   envelope shape, or the echoed command token did not match the request
//! - **Validation Errors**: A cleaned response failed its metric's grammar
//! - **Invalid Command**: A caller-supplied token outside the known command set
//!
//! ### System Errors
//! - **Configuration Errors**: Rejected connection parameters (bad URL scheme,
//!   unsupported baud rate, zero timeout)
//!
//! ## Error Recovery
//!
//! Per-request failures are retryable by the caller without reopening the
//! connection; connection-level failures are fatal to the client instance:
//!
//! ```rust
//! use voltage_probe::{ProbeError, ProbeResult};
//!
//! fn handle_error(result: ProbeResult<String>) {
//!     match result {
//!         Ok(value) => println!("Success: {}", value),
//!         Err(error) => {
//!             if error.is_recoverable() {
//!                 println!("Retryable error: {}", error);
//!                 // Caller may re-issue the same request
//!             } else {
//!                 println!("Fatal error: {}", error);
//!                 // Caller must reopen the client
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Error Classification
//!
//! ```rust
//! use voltage_probe::ProbeError;
//!
//! fn classify_error(error: &ProbeError) {
//!     if error.is_transport_error() {
//!         println!("Transport issue: {}", error);
//!     } else if error.is_protocol_error() {
//!         println!("Exchange content issue: {}", error);
//!     } else {
//!         println!("Other issue: {}", error);
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for probe operations
///
/// This is a convenience type alias that uses `ProbeError` as the error type
/// for all device operations, providing consistent error handling throughout
/// the codebase.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Comprehensive probe error types
///
/// This enumeration covers all possible error conditions that can occur while
/// querying a measurement device, from transport-level issues to envelope
/// framing violations and response grammar failures.
///
/// Each variant provides detailed context about the specific failure, making it
/// easier to diagnose issues and decide between retrying a request and
/// reopening the connection.
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    /// I/O related errors (serial, socket)
    ///
    /// Covers low-level I/O failures underneath an established connection.
    ///
    /// # Examples
    /// - Serial write interrupted
    /// - Socket reset by peer
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Connection errors
    ///
    /// The transport could not be opened, the peer closed the channel, or an
    /// operation was attempted while the client was closed. Fatal to the
    /// client instance; the caller must reopen rather than retry.
    ///
    /// # Examples
    /// - Serial device path missing or busy
    /// - WebSocket endpoint unreachable
    /// - `get_voltage` called after `close`
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Timeout errors
    ///
    /// No frame arrived within the configured read timeout. Includes context
    /// about which operation timed out and the timeout duration. Timeout is
    /// the only cancellation mechanism for an outstanding exchange.
    ///
    /// # Examples
    /// - Device silent after a command write
    /// - Gateway holding the socket open without answering
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Protocol-level errors
    ///
    /// A received frame could not be parsed into the expected envelope shape,
    /// or the echoed command token did not match the one sent. This is a
    /// framing failure, distinct from a grammar-validation failure on the
    /// payload content.
    ///
    /// # Examples
    /// - WebSocket message is not valid envelope JSON
    /// - Envelope echoes `GET_V` for a `GET_A` request
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Response validation failure
    ///
    /// A cleaned response was read successfully but failed its metric's
    /// grammar. Carries the offending cleaned value for diagnostics.
    ///
    /// # Examples
    /// - `V_12.5V` (decimal point not in the voltage grammar)
    /// - `S_ab123` (lowercase letters not in the serial grammar)
    #[error("Invalid {metric} response format: {value}")]
    Validation { metric: String, value: String },

    /// Unknown command token
    ///
    /// The caller supplied a token outside the known command set. The message
    /// enumerates the valid tokens. Raised before anything is written to the
    /// transport.
    ///
    /// # Examples
    /// - `GET_X`
    /// - an empty string
    #[error("Invalid command: {token}. Valid commands are: {valid}")]
    InvalidCommand { token: String, valid: String },

    /// Configuration errors
    ///
    /// Connection parameters were rejected before any open attempt.
    ///
    /// # Examples
    /// - WebSocket URL without a `ws://` or `wss://` scheme
    /// - Unsupported baud rate
    /// - Zero read timeout
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ProbeError {
    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a new timeout error
    ///
    /// # Arguments
    ///
    /// * `operation` - Description of the operation that timed out
    /// * `timeout_ms` - Timeout duration in milliseconds
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms
        }
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Create a validation error carrying the offending cleaned value
    ///
    /// # Arguments
    ///
    /// * `metric` - Human-readable metric name (e.g. "voltage")
    /// * `value` - The cleaned response that failed the grammar
    pub fn validation<M: Into<String>, V: Into<String>>(metric: M, value: V) -> Self {
        Self::Validation {
            metric: metric.into(),
            value: value.into()
        }
    }

    /// Create an invalid command error
    ///
    /// # Arguments
    ///
    /// * `token` - The rejected command token
    /// * `valid` - Rendered list of all valid tokens
    pub fn invalid_command<T: Into<String>, V: Into<String>>(token: T, valid: V) -> Self {
        Self::InvalidCommand {
            token: token.into(),
            valid: valid.into()
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// Per-request failures leave the connection open, so the caller may
    /// re-issue the same request explicitly. Connection-level failures are
    /// fatal to the client instance and require a reopen.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use voltage_probe::ProbeError;
    ///
    /// let timeout_error = ProbeError::timeout("read response", 1000);
    /// assert!(timeout_error.is_recoverable());
    ///
    /// let connection_error = ProbeError::connection("port busy");
    /// assert!(!connection_error.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(self,
            Self::Timeout { .. } |
            Self::Protocol { .. } |
            Self::Validation { .. }
        )
    }

    /// Check if the error is a transport issue
    ///
    /// Identifies errors related to the underlying channel (serial line,
    /// WebSocket) rather than the content of an exchange.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use voltage_probe::ProbeError;
    ///
    /// let connection_error = ProbeError::connection("Connection refused");
    /// assert!(connection_error.is_transport_error());
    ///
    /// let validation_error = ProbeError::validation("voltage", "V_12.5V");
    /// assert!(!validation_error.is_transport_error());
    /// ```
    pub fn is_transport_error(&self) -> bool {
        matches!(self,
            Self::Io { .. } |
            Self::Connection { .. } |
            Self::Timeout { .. }
        )
    }

    /// Check if the error concerns the content of an exchange
    ///
    /// Identifies failures in what came back (or what was asked for) on an
    /// otherwise healthy connection.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use voltage_probe::ProbeError;
    ///
    /// let protocol_error = ProbeError::protocol("unparseable envelope");
    /// assert!(protocol_error.is_protocol_error());
    ///
    /// let io_error = ProbeError::io("broken pipe");
    /// assert!(!io_error.is_protocol_error());
    /// ```
    pub fn is_protocol_error(&self) -> bool {
        matches!(self,
            Self::Protocol { .. } |
            Self::Validation { .. } |
            Self::InvalidCommand { .. }
        )
    }
}

/// Convert from std::io::Error
///
/// Automatically converts standard I/O errors to `ProbeError::Io`,
/// preserving the original error message for debugging.
impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Convert from tokio timeout errors
///
/// Converts Tokio's timeout errors to `ProbeError::Timeout` with
/// a generic timeout message (specific operation and duration should be
/// provided when creating timeout errors manually).
impl From<tokio::time::error::Elapsed> for ProbeError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("Operation timeout", 0)
    }
}

/// Convert from serde JSON errors
///
/// An envelope that fails to deserialize is a framing failure, not a
/// grammar-validation failure.
impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("JSON envelope error: {}", err))
    }
}

/// Convert from serial port errors
impl From<tokio_serial::Error> for ProbeError {
    fn from(err: tokio_serial::Error) -> Self {
        Self::connection(format!("Serial port error: {}", err))
    }
}

/// Convert from WebSocket errors
impl From<tokio_tungstenite::tungstenite::Error> for ProbeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(e) => Self::io(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::connection("WebSocket connection closed")
            },
            WsError::Protocol(e) => Self::protocol(format!("WebSocket protocol violation: {}", e)),
            other => Self::connection(other.to_string()),
        }
    }
}
