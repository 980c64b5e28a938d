//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ring_proxy_requests_total` (counter): routed requests by method, status, backend
//! - `ring_proxy_request_duration_seconds` (histogram): routing + forward latency
//! - `ring_proxy_backend_health` (gauge): 1=healthy, 0=suspect or evicted
//! - `ring_proxy_evictions_total` (counter): health evictions by backend
//! - `ring_proxy_members` (gauge): registered backends
//! - `ring_proxy_ring_entries` (gauge): virtual nodes on the ring

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metric_descriptions();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!("ring_proxy_requests_total", "Total routed requests");
    describe_histogram!(
        "ring_proxy_request_duration_seconds",
        "Time to resolve and forward a request in seconds"
    );
    describe_gauge!("ring_proxy_backend_health", "Backend health from the last probe (1=healthy)");
    describe_counter!("ring_proxy_evictions_total", "Backends evicted by the health monitor");
    describe_gauge!("ring_proxy_members", "Registered backends");
    describe_gauge!("ring_proxy_ring_entries", "Virtual nodes on the hash ring");
}

pub fn record_request(method: &str, status: u16, backend: &str, start_time: Instant) {
    counter!(
        "ring_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!("ring_proxy_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("ring_proxy_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_eviction(backend: &str) {
    counter!("ring_proxy_evictions_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_membership(members: usize, ring_entries: usize) {
    gauge!("ring_proxy_members").set(members as f64);
    gauge!("ring_proxy_ring_entries").set(ring_entries as f64);
}
