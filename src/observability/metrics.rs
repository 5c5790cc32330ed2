//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_http_requests_total` (counter): requests by route kind, status
//! - `proxy_http_request_duration_seconds` (histogram): latency by route kind
//! - `proxy_active_pairings` (gauge): live bridged pairings
//! - `proxy_pairings_total` (counter): finished pairings by outcome
//! - `proxy_frames_total` / `proxy_frame_bytes_total` (counters): relayed
//!   frames by direction
//! - `proxy_oversize_frames_total` (counter): client frames refused for size
//! - `proxy_backend_connect_failures_total` (counter)
//!
//! Without an installed recorder every call is a no-op, so library code
//! records unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished HTTP request.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("proxy_http_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("proxy_http_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_pairings(active: u64) {
    gauge!("proxy_active_pairings").set(active as f64);
}

/// Record a finished pairing and how it ended.
pub fn record_pairing_closed(outcome: &'static str, start: Instant) {
    counter!("proxy_pairings_total", "outcome" => outcome).increment(1);
    histogram!("proxy_pairing_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_frame(direction: &'static str, bytes: usize) {
    counter!("proxy_frames_total", "direction" => direction).increment(1);
    counter!("proxy_frame_bytes_total", "direction" => direction).increment(bytes as u64);
}

pub fn record_oversize_frame() {
    counter!("proxy_oversize_frames_total").increment(1);
}

pub fn record_connect_failure() {
    counter!("proxy_backend_connect_failures_total").increment(1);
}
