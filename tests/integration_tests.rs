//! Integration Tests for Voltage Probe Library
//!
//! This module contains integration tests that test the library
//! components working together in realistic scenarios: the protocol layer
//! over a mock transport, and live WebSocket exchanges against an
//! in-process gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use voltage_probe::{
    scoped, GenericProbeClient, Metric, ProbeClient, ProbeError, ProbeResult, ProbeTransport,
    RawFrame, ResponseEnvelope, SerialProbeClient, TransportStats, WsProbeClient,
};

/// Mock transport with canned frames, for testing the protocol layer
/// without hardware
struct MockTransport {
    open: Arc<AtomicBool>,
    close_count: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<String>>>,
    frames: VecDeque<RawFrame>,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
            close_count: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(Mutex::new(Vec::new())),
            frames: VecDeque::new(),
        }
    }

    /// A transport that was never opened
    fn closed() -> Self {
        let transport = Self::new();
        transport.open.store(false, Ordering::SeqCst);
        transport
    }

    /// Queue a frame to be returned by the next `read_frame`
    fn push_frame(&mut self, frame: RawFrame) {
        self.frames.push_back(frame);
    }

    fn push_line(&mut self, line: &str) {
        self.push_frame(RawFrame::Line(line.to_string()));
    }

    fn push_envelope(&mut self, cmd: &str, payload: &str) {
        self.push_frame(RawFrame::Envelope(ResponseEnvelope {
            cmd: cmd.to_string(),
            payload: payload.to_string(),
        }));
    }

    /// Shared handles for observing the transport after the client owns it
    fn handles(&self) -> (Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        (self.close_count.clone(), self.writes.clone())
    }
}

#[async_trait]
impl ProbeTransport for MockTransport {
    async fn write_frame(&mut self, command: &str) -> ProbeResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ProbeError::connection("Mock transport is closed"));
        }
        self.writes.lock().unwrap().push(command.to_string());
        Ok(())
    }

    async fn read_frame(&mut self) -> ProbeResult<RawFrame> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ProbeError::connection("Mock transport is closed"));
        }
        self.frames
            .pop_front()
            .ok_or_else(|| ProbeError::timeout("read response", 10))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Test that a raw serial line is cleaned before it reaches the caller
#[tokio::test]
async fn test_line_response_cleaned_end_to_end() {
    let mut transport = MockTransport::new();
    transport.push_line("  V_12V  \r\n");

    let mut client = GenericProbeClient::new(transport);
    let value = client.get_voltage().await.unwrap();
    assert_eq!(value, "V_12V");
}

/// Test that grammar-conforming responses for every metric are returned
/// verbatim after cleaning
#[tokio::test]
async fn test_valid_responses_accepted() {
    let cases = [
        (Metric::Voltage, "V_0V"),
        (Metric::Ampere, "A_12A"),
        (Metric::Serial, "S_A"),
    ];

    for (metric, response) in cases {
        let mut transport = MockTransport::new();
        transport.push_line(response);

        let mut client = GenericProbeClient::new(transport);
        let value = client.query(metric).await.unwrap();
        assert_eq!(value, response);
    }
}

/// Test that grammar deviations are rejected with a validation error
/// carrying the offending value
#[tokio::test]
async fn test_invalid_responses_rejected() {
    let cases = [
        (Metric::Voltage, "V_12.5V"),
        (Metric::Ampere, "A_12"),
        (Metric::Serial, "S_ab123"),
        (Metric::Ampere, "AMP_12A"),
    ];

    for (metric, response) in cases {
        let mut transport = MockTransport::new();
        transport.push_line(response);

        let mut client = GenericProbeClient::new(transport);
        match client.query(metric).await {
            Err(ProbeError::Validation { value, .. }) => assert_eq!(value, response),
            other => panic!("expected validation error for {:?}, got {:?}", response, other),
        }
    }
}

/// Test that a closed client rejects every call, not only the first
#[tokio::test]
async fn test_closed_client_rejects_every_call() {
    let mut client = GenericProbeClient::new(MockTransport::closed());

    for _ in 0..3 {
        assert!(matches!(
            client.get_voltage().await,
            Err(ProbeError::Connection { .. })
        ));
    }
    assert!(matches!(
        client.get_ampere().await,
        Err(ProbeError::Connection { .. })
    ));
    assert!(matches!(
        client.send_command("GET_V").await,
        Err(ProbeError::Connection { .. })
    ));
}

/// Test that close is idempotent and does not double-release
#[tokio::test]
async fn test_close_is_idempotent() {
    let transport = MockTransport::new();
    let (close_count, _) = transport.handles();

    let mut client = GenericProbeClient::new(transport);
    client.close().await.unwrap();
    client.close().await.unwrap();

    assert_eq!(close_count.load(Ordering::SeqCst), 1);
    assert!(!client.is_open());

    // And every call after close fails deterministically
    assert!(matches!(
        client.get_serial().await,
        Err(ProbeError::Connection { .. })
    ));
}

/// Test that an unknown token is rejected before anything reaches the wire
#[tokio::test]
async fn test_invalid_command_performs_no_write() {
    let transport = MockTransport::new();
    let (_, writes) = transport.handles();

    let mut client = GenericProbeClient::new(transport);
    match client.send_command("GET_X").await {
        Err(ProbeError::InvalidCommand { token, valid }) => {
            assert_eq!(token, "GET_X");
            assert!(valid.contains("GET_V"));
            assert!(valid.contains("GET_A"));
            assert!(valid.contains("GET_S"));
        }
        other => panic!("expected invalid command error, got {:?}", other),
    }

    assert!(writes.lock().unwrap().is_empty());
}

/// Test that send_command returns the cleaned response without grammar
/// validation
#[tokio::test]
async fn test_send_command_skips_grammar() {
    let mut transport = MockTransport::new();
    transport.push_line("  not-a-grammar-match \r\n");

    let mut client = GenericProbeClient::new(transport);
    let value = client.send_command("GET_V").await.unwrap();
    assert_eq!(value, "not-a-grammar-match");
}

/// Test that scoped use closes the client on the success path
#[tokio::test]
async fn test_scoped_closes_on_success() {
    let mut transport = MockTransport::new();
    transport.push_line("V_12V");
    let (close_count, _) = transport.handles();

    let client = GenericProbeClient::new(transport);
    let value = scoped(client, |c| Box::pin(async move { c.get_voltage().await }))
        .await
        .unwrap();

    assert_eq!(value, "V_12V");
    assert_eq!(close_count.load(Ordering::SeqCst), 1);
}

/// Test that scoped use closes the client even when a query fails inside
/// the scope
#[tokio::test]
async fn test_scoped_closes_on_error() {
    // No frames queued: the query inside the scope times out
    let transport = MockTransport::new();
    let (close_count, _) = transport.handles();

    let client = GenericProbeClient::new(transport);
    let result = scoped(client, |c| Box::pin(async move { c.get_voltage().await })).await;

    assert!(matches!(result, Err(ProbeError::Timeout { .. })));
    assert_eq!(close_count.load(Ordering::SeqCst), 1);
}

/// Test that an envelope echoing the wrong command token is a protocol
/// error, and that the failure does not close the connection
#[tokio::test]
async fn test_envelope_echo_mismatch_is_protocol_error() {
    let mut transport = MockTransport::new();
    transport.push_envelope("GET_V", "V_12V");
    transport.push_envelope("GET_A", "A_5A");

    let mut client = GenericProbeClient::new(transport);
    assert!(matches!(
        client.get_ampere().await,
        Err(ProbeError::Protocol { .. })
    ));

    // Per-request failure: the client stays open and the next exchange works
    assert!(client.is_open());
    assert_eq!(client.get_ampere().await.unwrap(), "A_5A");
}

/// Test that envelope payloads are cleaned like line responses
#[tokio::test]
async fn test_envelope_payload_cleaned() {
    let mut transport = MockTransport::new();
    transport.push_envelope("GET_S", " S_ABC123\r\n");

    let mut client = GenericProbeClient::new(transport);
    assert_eq!(client.get_serial().await.unwrap(), "S_ABC123");
}

// ---------------------------------------------------------------------------
// Live WebSocket tests against an in-process gateway
// ---------------------------------------------------------------------------

/// Spawn a WebSocket gateway on an ephemeral port. `respond` maps the
/// received command token to the raw text to send back; `None` means stay
/// silent.
async fn spawn_gateway<F>(respond: F) -> String
where
    F: Fn(&str) -> Option<String> + Send + Sync + 'static,
{
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let cmd = serde_json::from_str::<serde_json::Value>(&text)
                            .ok()
                            .and_then(|v| v.get("cmd").and_then(|c| c.as_str()).map(String::from))
                            .unwrap_or_default();
                        if let Some(reply) = respond(&cmd) {
                            if ws.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    format!("ws://{}", addr)
}

fn well_formed_reply(cmd: &str) -> Option<String> {
    let payload = match cmd {
        "GET_V" => "V_12V",
        "GET_A" => "A_5A",
        "GET_S" => "S_ABC123",
        _ => return None,
    };
    Some(format!(r#"{{"cmd":"{}","payload":"{}"}}"#, cmd, payload))
}

/// End-to-end round trip for all three metrics over a live gateway
#[tokio::test]
async fn test_ws_round_trip() {
    let url = spawn_gateway(well_formed_reply).await;

    let mut client = WsProbeClient::connect(&url).await.unwrap();
    assert!(client.is_open());

    assert_eq!(client.get_voltage().await.unwrap(), "V_12V");
    assert_eq!(client.get_ampere().await.unwrap(), "A_5A");
    assert_eq!(client.get_serial().await.unwrap(), "S_ABC123");

    // Raw escape hatch over the same connection
    assert_eq!(client.send_command("GET_S").await.unwrap(), "S_ABC123");

    let stats = client.get_stats();
    assert_eq!(stats.requests_sent, 4);
    assert_eq!(stats.responses_received, 4);

    client.close().await.unwrap();
    assert!(!client.is_open());
    client.close().await.unwrap();
}

/// A gateway answering with the wrong echoed token yields a protocol error
#[tokio::test]
async fn test_ws_token_mismatch_is_protocol_error() {
    let url = spawn_gateway(|_| Some(r#"{"cmd":"GET_V","payload":"V_12V"}"#.to_string())).await;

    let mut client = WsProbeClient::connect(&url).await.unwrap();
    assert!(matches!(
        client.get_ampere().await,
        Err(ProbeError::Protocol { .. })
    ));

    // The mismatched request still leaves the connection usable
    assert_eq!(client.get_voltage().await.unwrap(), "V_12V");

    client.close().await.unwrap();
}

/// A gateway answering with an unparseable envelope yields a protocol error
#[tokio::test]
async fn test_ws_junk_envelope_is_protocol_error() {
    let url = spawn_gateway(|_| Some("definitely not json".to_string())).await;

    let mut client = WsProbeClient::connect(&url).await.unwrap();
    assert!(matches!(
        client.get_voltage().await,
        Err(ProbeError::Protocol { .. })
    ));

    client.close().await.unwrap();
}

/// An envelope missing the payload field is a framing failure too
#[tokio::test]
async fn test_ws_missing_payload_is_protocol_error() {
    let url = spawn_gateway(|cmd| Some(format!(r#"{{"cmd":"{}"}}"#, cmd))).await;

    let mut client = WsProbeClient::connect(&url).await.unwrap();
    assert!(matches!(
        client.get_serial().await,
        Err(ProbeError::Protocol { .. })
    ));

    client.close().await.unwrap();
}

/// A silent gateway yields a timeout, classified as such
#[tokio::test]
async fn test_ws_silent_gateway_times_out() {
    let url = spawn_gateway(|_| None).await;

    let mut client = WsProbeClient::connect_with_timeout(&url, Duration::from_millis(200))
        .await
        .unwrap();

    match client.get_voltage().await {
        Err(ProbeError::Timeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 200),
        other => panic!("expected timeout, got {:?}", other),
    }

    // Timeout is a per-request failure; the connection stays open
    assert!(client.is_open());

    client.close().await.unwrap();
}

/// Serial client creation without hardware must fail cleanly, not panic
#[tokio::test]
async fn test_serial_client_without_hardware() {
    let result = SerialProbeClient::new("/dev/ttyUSB0");
    match result {
        Ok(client) => {
            // A device actually is attached; just verify the state machine
            assert!(client.is_open());
        }
        Err(err) => {
            assert!(matches!(err, ProbeError::Connection { .. }));
        }
    }
}
