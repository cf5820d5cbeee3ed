//! Voltage Probe Demo
//!
//! Author: Evan Liu <evan.liu@voltageenergy.com>
//! This program demonstrates basic usage of the voltage_probe library against
//! a serial device or a WebSocket gateway.

use anyhow::Result;
use voltage_probe::{
    CallbackLogger, OperationTimer, PerformanceMetrics, ProbeClient, SerialConfig,
    SerialProbeClient, WsConfig, WsProbeClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("🚀 Voltage Probe Demo");
    println!("=====================");

    let mode = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "serial".to_string());

    let endpoint = std::env::args().nth(2).unwrap_or_else(|| match mode.as_str() {
        "ws" => "ws://localhost:8765".to_string(),
        _ => "/dev/ttyUSB0".to_string(),
    });

    println!("Connecting via {} to {}...", mode, endpoint);

    let logger = CallbackLogger::console();

    let mut client: Box<dyn ProbeClient> = match mode.as_str() {
        "serial" => {
            match SerialProbeClient::with_logging(SerialConfig::new(&endpoint), Some(logger)) {
                Ok(client) => {
                    println!("✅ Connected successfully!");
                    Box::new(client)
                }
                Err(e) => {
                    eprintln!("❌ Failed to connect: {}", e);
                    eprintln!("Make sure a device is attached at {}", endpoint);
                    return Ok(());
                }
            }
        }
        "ws" => {
            match WsProbeClient::with_logging(WsConfig::new(&endpoint), Some(logger)).await {
                Ok(client) => {
                    println!("✅ Connected successfully!");
                    Box::new(client)
                }
                Err(e) => {
                    eprintln!("❌ Failed to connect: {}", e);
                    eprintln!("Make sure a gateway is running at {}", endpoint);
                    return Ok(());
                }
            }
        }
        other => {
            eprintln!("Unknown mode '{}': expected 'serial' or 'ws'", other);
            return Ok(());
        }
    };

    let mut metrics = PerformanceMetrics::new();

    println!("\n📖 Querying metrics...");

    let timer = OperationTimer::start("get_voltage");
    match client.get_voltage().await {
        Ok(value) => {
            metrics.record_success(timer.stop_and_log(true));
            println!("⚡ Voltage: {}", value);
        }
        Err(e) => {
            metrics.record_failure(timer.stop_and_log(false));
            println!("❌ Voltage query failed: {}", e);
        }
    }

    let timer = OperationTimer::start("get_ampere");
    match client.get_ampere().await {
        Ok(value) => {
            metrics.record_success(timer.stop_and_log(true));
            println!("🔌 Current: {}", value);
        }
        Err(e) => {
            metrics.record_failure(timer.stop_and_log(false));
            println!("❌ Current query failed: {}", e);
        }
    }

    let timer = OperationTimer::start("get_serial");
    match client.get_serial().await {
        Ok(value) => {
            metrics.record_success(timer.stop_and_log(true));
            println!("🏷️  Serial number: {}", value);
        }
        Err(e) => {
            metrics.record_failure(timer.stop_and_log(false));
            println!("❌ Serial number query failed: {}", e);
        }
    }

    // Raw escape hatch: same exchange, grammar left to the caller
    match client.send_command("GET_V").await {
        Ok(value) => println!("\n🔧 Raw GET_V response: '{}'", value),
        Err(e) => println!("\n❌ Raw command failed: {}", e),
    }

    let stats = client.get_stats();
    println!("\n📊 Transport statistics:");
    println!("  Requests sent: {}", stats.requests_sent);
    println!("  Responses received: {}", stats.responses_received);
    println!("  Errors: {}", stats.errors);
    println!("  Timeouts: {}", stats.timeouts);
    println!("  Bytes sent: {}", stats.bytes_sent);
    println!("  Bytes received: {}", stats.bytes_received);

    println!("\n📈 Exchange metrics:");
    println!("  Success rate: {:.1}%", metrics.success_rate());
    println!("  Average duration: {:?}", metrics.average_duration());

    client.close().await?;
    println!("\n👋 Connection closed");

    Ok(())
}
