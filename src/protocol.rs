//! Probe protocol definitions and data structures
//!
//! This module contains the core protocol definitions for querying a
//! measurement device: the metric/command table, the WebSocket envelope
//! types, response cleaning, and the per-metric response grammars.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};

/// Response grammar for voltage readings (`V_12V`)
static VOLTAGE_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^V_\d+V$").expect("voltage grammar"));

/// Response grammar for current readings (`A_5A`)
static AMPERE_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^A_\d+A$").expect("ampere grammar"));

/// Response grammar for serial numbers (`S_ABC123`)
static SERIAL_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^S_[A-Z0-9]+$").expect("serial grammar"));

/// The measurements a device can be queried for
///
/// This is a fixed, closed set. Every metric has exactly one wire command
/// token and exactly one response grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Supply voltage (`GET_V`)
    Voltage,
    /// Supply current (`GET_A`)
    Ampere,
    /// Device serial number (`GET_S`)
    Serial,
}

impl Metric {
    /// All metrics, in command-table order
    pub const ALL: [Metric; 3] = [Metric::Voltage, Metric::Ampere, Metric::Serial];

    /// Wire command token for this metric
    pub fn command(self) -> &'static str {
        match self {
            Metric::Voltage => "GET_V",
            Metric::Ampere => "GET_A",
            Metric::Serial => "GET_S",
        }
    }

    /// Resolve a command token back to its metric
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::InvalidCommand` (listing the valid token set)
    /// for any token outside the command table.
    pub fn from_command(token: &str) -> ProbeResult<Self> {
        match token {
            "GET_V" => Ok(Metric::Voltage),
            "GET_A" => Ok(Metric::Ampere),
            "GET_S" => Ok(Metric::Serial),
            _ => Err(ProbeError::invalid_command(token, valid_commands())),
        }
    }

    /// Human-readable metric name, used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Metric::Voltage => "voltage",
            Metric::Ampere => "ampere",
            Metric::Serial => "serial",
        }
    }

    fn grammar(self) -> &'static Regex {
        match self {
            Metric::Voltage => &VOLTAGE_GRAMMAR,
            Metric::Ampere => &AMPERE_GRAMMAR,
            Metric::Serial => &SERIAL_GRAMMAR,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.command())
    }
}

/// Render the full set of valid command tokens for diagnostics
pub fn valid_commands() -> String {
    Metric::ALL
        .iter()
        .map(|m| m.command())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check whether a token is in the command table
pub fn is_valid_command(token: &str) -> bool {
    Metric::ALL.iter().any(|m| m.command() == token)
}

/// Outbound WebSocket envelope: `{"cmd": "<TOKEN>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub cmd: String,
}

impl CommandEnvelope {
    /// Create an envelope for a command token
    pub fn new<S: Into<String>>(cmd: S) -> Self {
        Self { cmd: cmd.into() }
    }

    /// Serialize to the wire JSON form
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound WebSocket envelope: `{"cmd": "<TOKEN>", "payload": "<value>"}`
///
/// `cmd` must echo the outbound token; the caller checks that. A message
/// that does not deserialize into this shape is a framing failure
/// (`ProbeError::Protocol`), not a grammar-validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub cmd: String,
    pub payload: String,
}

impl ResponseEnvelope {
    /// Parse an envelope from wire JSON
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Protocol` if the text is not valid JSON or is
    /// missing the `cmd`/`payload` fields.
    pub fn from_json(text: &str) -> ProbeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Clean a raw response before validation
///
/// Strips all control characters (the C0 range, DEL, and the C1 range) and
/// surrounding whitespace. Embedded CR/LF bytes fall in the C0 range and are
/// removed as well. Every non-empty raw read goes through this exactly once,
/// before validation.
pub fn clean_response(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    stripped.trim().to_string()
}

/// Check a cleaned response against the grammar for a metric
///
/// Pure and total: always returns a boolean, never errors.
pub fn validate_response(metric: Metric, response: &str) -> bool {
    metric.grammar().is_match(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table_total() {
        assert_eq!(Metric::Voltage.command(), "GET_V");
        assert_eq!(Metric::Ampere.command(), "GET_A");
        assert_eq!(Metric::Serial.command(), "GET_S");

        for metric in Metric::ALL {
            assert_eq!(Metric::from_command(metric.command()).unwrap(), metric);
        }
    }

    #[test]
    fn test_unknown_token_lists_valid_set() {
        let err = Metric::from_command("GET_X").unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("GET_V"));
        assert!(msg.contains("GET_A"));
        assert!(msg.contains("GET_S"));
    }

    #[test]
    fn test_valid_responses_accepted() {
        assert!(validate_response(Metric::Voltage, "V_0V"));
        assert!(validate_response(Metric::Voltage, "V_12V"));
        assert!(validate_response(Metric::Ampere, "A_5A"));
        assert!(validate_response(Metric::Ampere, "A_12A"));
        assert!(validate_response(Metric::Serial, "S_A"));
        assert!(validate_response(Metric::Serial, "S_ABC123"));
    }

    #[test]
    fn test_invalid_responses_rejected() {
        // decimal points
        assert!(!validate_response(Metric::Voltage, "V_12.5V"));
        // missing suffix
        assert!(!validate_response(Metric::Ampere, "A_12"));
        // lowercase letters
        assert!(!validate_response(Metric::Serial, "S_ab123"));
        // wrong prefix
        assert!(!validate_response(Metric::Ampere, "AMP_12A"));
        // embedded space
        assert!(!validate_response(Metric::Voltage, "V_12 V"));
        // empty
        for metric in Metric::ALL {
            assert!(!validate_response(metric, ""));
        }
        // cross-metric values do not pass each other's grammar
        assert!(!validate_response(Metric::Voltage, "A_5A"));
        assert!(!validate_response(Metric::Serial, "V_12V"));
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("  V_12V  \r\n"), "V_12V");
        assert_eq!(clean_response("\x00A_5A\x1f"), "A_5A");
        assert_eq!(clean_response("S_AB\rC1\n23"), "S_ABC123");
        // C1 control range
        assert_eq!(clean_response("\u{0085}V_3V\u{009f}"), "V_3V");
        assert_eq!(clean_response(""), "");
    }

    #[test]
    fn test_envelope_round_trip() {
        let cmd = CommandEnvelope::new("GET_V");
        let json = cmd.to_json().unwrap();
        assert_eq!(json, r#"{"cmd":"GET_V"}"#);

        let resp = ResponseEnvelope::from_json(r#"{"cmd":"GET_V","payload":"V_12V"}"#).unwrap();
        assert_eq!(resp.cmd, "GET_V");
        assert_eq!(resp.payload, "V_12V");
    }

    #[test]
    fn test_envelope_shape_failures() {
        assert!(ResponseEnvelope::from_json("not json").is_err());
        assert!(ResponseEnvelope::from_json(r#"{"cmd":"GET_V"}"#).is_err());
        assert!(ResponseEnvelope::from_json(r#"{"payload":"V_12V"}"#).is_err());
        assert!(ResponseEnvelope::from_json(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn test_is_valid_command() {
        assert!(is_valid_command("GET_V"));
        assert!(is_valid_command("GET_A"));
        assert!(is_valid_command("GET_S"));
        assert!(!is_valid_command("get_v"));
        assert!(!is_valid_command(""));
        assert!(!is_valid_command("GET_V "));
    }
}
