//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_selection_failures_total` (counter): selections refused, by reason
//! - `gateway_breaker_transitions_total` (counter): breaker state changes by backend
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(service: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_selection_failure(service: &str, reason: &'static str) {
    counter!(
        "gateway_selection_failures_total",
        "service" => service.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_breaker_transition(backend: &str, to: CircuitState) {
    counter!(
        "gateway_breaker_transitions_total",
        "backend" => backend.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}
