//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status, disposition
//! - `relay_request_duration_seconds` (histogram): latency distribution
//! - `relay_cache_lookups_total` (counter): hit / miss / expired
//! - `relay_cache_entries` (gauge): stored entries
//! - `relay_render_attempts_total` (counter): rendered / timed_out / launch_failed / ...
//! - `relay_render_sessions_active` (gauge): live browser sessions
//! - `relay_broadcasts_total` (counter): increment-and-broadcast cycles
//! - `relay_subscribers` (gauge): connected real-time subscribers

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, disposition: &'static str, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "disposition" => disposition
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "disposition" => disposition)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("relay_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("relay_cache_entries").set(entries as f64);
}

pub fn record_render_attempt(outcome: &'static str, start: Instant) {
    counter!("relay_render_attempts_total", "outcome" => outcome).increment(1);
    histogram!("relay_render_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_render_sessions(active: usize) {
    gauge!("relay_render_sessions_active").set(active as f64);
}

pub fn record_broadcast(value: u64) {
    counter!("relay_broadcasts_total").increment(1);
    gauge!("relay_counter_value").set(value as f64);
}

pub fn record_subscribers(count: usize) {
    gauge!("relay_subscribers").set(count as f64);
}
