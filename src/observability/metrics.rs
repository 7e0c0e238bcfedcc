//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tollgate_requests_total` (counter): gateway requests by status, backend
//! - `tollgate_request_duration_seconds` (histogram): latency distribution
//! - `tollgate_backend_connections` (gauge): in-flight requests per backend
//! - `tollgate_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `tollgate_rate_limited_total` (counter): requests rejected with 429
//! - `tollgate_clients_registered_total` (counter): new buckets by source
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram, Gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, backend: &str, start: Instant) {
    let labels = [
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("tollgate_requests_total", &labels).increment(1);
    histogram!("tollgate_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("tollgate_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Handle for a backend's in-flight gauge, registered once per backend.
///
/// A handle taken before [`init_metrics`] stays a no-op.
pub fn backend_connections_gauge(backend: &str) -> Gauge {
    gauge!("tollgate_backend_connections", "backend" => backend.to_string())
}

pub fn record_rate_limited() {
    counter!("tollgate_rate_limited_total").increment(1);
}

/// `source` is `"gateway"` for first contact or `"admin"` for the API.
pub fn record_client_registered(source: &'static str) {
    counter!("tollgate_clients_registered_total", "source" => source).increment(1);
}
