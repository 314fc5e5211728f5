//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, replay attempts)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_replay_attempts_total` (counter): attempts by outcome
//! - `proxy_retries_exhausted_total` (counter): requests whose attempts all failed
//! - `proxy_websocket_sessions_total` (counter): upgrades by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality: no paths, no backend URLs

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished client request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

/// Record one replay attempt.
pub fn record_attempt(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    ::metrics::counter!("proxy_replay_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_retries_exhausted() {
    ::metrics::counter!("proxy_retries_exhausted_total").increment(1);
}

/// Record how a WebSocket upgrade ended.
pub fn record_websocket_session(outcome: &'static str) {
    ::metrics::counter!("proxy_websocket_sessions_total", "outcome" => outcome).increment(1);
}
