//! Prometheus metrics for monitoring tournament server health.
//!
//! Metrics are exposed in Prometheus text format on a separate listener when
//! `METRICS_BIND` is set. Without an installed exporter the recording calls
//! below are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dt_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/tournaments/enter", 200);
//! ```

use daily_tournament::tournament::{EndOutcome, StartOutcome, TickOutcome};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

/// Record the outcome of a tournament entry request.
///
/// `outcome` is `joined`, `rejected`, `contention` or `error`.
pub fn tournament_joins_total(outcome: &'static str) {
    metrics::counter!("tournament_joins_total", "outcome" => outcome).increment(1);
}

/// Increment the counter of requests that exhausted their CAS budget.
pub fn contention_exhausted_total(operation: &'static str) {
    metrics::counter!("contention_exhausted_total", "operation" => operation).increment(1);
}

/// Record a lifecycle transition performed by a tick or an admin call.
pub fn lifecycle_transitions_total(transition: &'static str) {
    metrics::counter!("lifecycle_transitions_total", "transition" => transition).increment(1);
}

/// Increment the counter of failed lifecycle ticks.
pub fn lifecycle_tick_failures_total() {
    metrics::counter!("lifecycle_tick_failures_total").increment(1);
}

/// Add the rewards granted by one End run.
pub fn rewards_granted_total(count: usize) {
    metrics::counter!("rewards_granted_total").increment(count as u64);
}

/// Record the transitions carried by a tick outcome.
pub fn record_tick(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Start { result } => record_start(result),
        TickOutcome::End { result } => record_end(result),
        TickOutcome::Idle => {}
    }
}

/// Record a Start, including the End it ran first.
pub fn record_start(outcome: &StartOutcome) {
    match outcome {
        StartOutcome::Started { previous, .. } => {
            if let Some(report) = previous {
                lifecycle_transitions_total("end");
                rewards_granted_total(report.rewards_granted);
            }
            lifecycle_transitions_total("start");
        }
        StartOutcome::AlreadyActive { .. } => {}
    }
}

/// Record an End.
pub fn record_end(outcome: &EndOutcome) {
    if let EndOutcome::Ended(report) = outcome {
        lifecycle_transitions_total(if report.resumed { "end_resumed" } else { "end" });
        rewards_granted_total(report.rewards_granted);
    }
}
