//! Utility functions and helpers for probe operations
//!
//! This module contains parameter validation used by the client
//! constructors, plus simple performance monitoring helpers.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

/// Performance metrics for probe exchanges
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
}

impl PerformanceMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful exchange
    pub fn record_success(&mut self, duration: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_duration += duration;

        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));
    }

    /// Record a failed exchange
    pub fn record_failure(&mut self, duration: Duration) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.total_duration += duration;
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.successful_requests as f64 / self.total_requests as f64) * 100.0
    }

    /// Get average exchange duration
    pub fn average_duration(&self) -> Duration {
        if self.total_requests == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.total_requests as u32
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Timer for measuring operation duration
pub struct OperationTimer {
    start: Instant,
    operation_name: String,
}

impl OperationTimer {
    /// Start a new timer
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting operation: {}", operation_name);
        Self {
            start: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Stop the timer and return duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        debug!("Operation '{}' completed in {:?}", self.operation_name, duration);
        duration
    }

    /// Stop timer and log result
    pub fn stop_and_log(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        if success {
            info!("Operation '{}' succeeded in {:?}", self.operation_name, duration);
        } else {
            warn!("Operation '{}' failed after {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// Connection parameter validation utilities
pub mod validation {
    use std::time::Duration;

    use crate::error::{ProbeError, ProbeResult};

    /// Baud rates the serial transport accepts
    pub const SUPPORTED_BAUD_RATES: [u32; 8] =
        [1200, 2400, 4800, 9600, 19_200, 38_400, 57_600, 115_200];

    /// Longest read timeout a client will accept
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

    /// Validate a serial baud rate against the supported set
    pub fn validate_baud_rate(baud_rate: u32) -> ProbeResult<()> {
        if SUPPORTED_BAUD_RATES.contains(&baud_rate) {
            Ok(())
        } else {
            Err(ProbeError::configuration(format!(
                "Unsupported baud rate: {}",
                baud_rate
            )))
        }
    }

    /// Validate a WebSocket endpoint URL
    ///
    /// The scheme must be `ws://` or `wss://` and a host part must follow.
    pub fn validate_endpoint_url(url: &str) -> ProbeResult<()> {
        let rest = url
            .strip_prefix("ws://")
            .or_else(|| url.strip_prefix("wss://"));

        match rest {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(ProbeError::configuration(format!(
                "Invalid WebSocket URL '{}': expected ws:// or wss:// endpoint",
                url
            ))),
        }
    }

    /// Validate a read timeout
    pub fn validate_timeout(timeout: Duration) -> ProbeResult<()> {
        if timeout.is_zero() {
            return Err(ProbeError::configuration("Read timeout must be non-zero"));
        }
        if timeout > MAX_TIMEOUT {
            return Err(ProbeError::configuration(format!(
                "Read timeout {:?} exceeds maximum {:?}",
                timeout, MAX_TIMEOUT
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_baud_rate_validation() {
            assert!(validate_baud_rate(9600).is_ok());
            assert!(validate_baud_rate(115_200).is_ok());
            assert!(validate_baud_rate(0).is_err());
            assert!(validate_baud_rate(1234).is_err());
        }

        #[test]
        fn test_endpoint_url_validation() {
            assert!(validate_endpoint_url("ws://localhost:8765").is_ok());
            assert!(validate_endpoint_url("wss://gateway.example.com/dev").is_ok());
            assert!(validate_endpoint_url("http://localhost:8765").is_err());
            assert!(validate_endpoint_url("ws://").is_err());
            assert!(validate_endpoint_url("").is_err());
        }

        #[test]
        fn test_timeout_validation() {
            assert!(validate_timeout(Duration::from_secs(1)).is_ok());
            assert!(validate_timeout(Duration::ZERO).is_err());
            assert!(validate_timeout(Duration::from_secs(301)).is_err());
        }
    }
}
