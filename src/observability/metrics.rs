//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record per-request counters and latencies through the `metrics` facade
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status, pattern
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `servlets_running` (gauge): servlets currently started
//!
//! # Design Decisions
//! - Label by matched pattern, never by raw path
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, pattern: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("pattern", pattern.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_servlets_running(count: usize) {
    metrics::gauge!("servlets_running").set(count as f64);
}
