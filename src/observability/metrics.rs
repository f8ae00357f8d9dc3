//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_decisions_total` (counter): access decisions by outcome, source
//! - `gate_store_lookups_total` (counter): allow-list lookups by result
//! - `gate_store_lookup_duration_seconds` (histogram): lookup latency
//! - `gate_cache_entries` (gauge): cache size after each sweep
//! - `gate_denials_total` (counter): denials by mode (redirect, drop, forbidden)
//! - `gate_upstream_requests_total` (counter): forwarded requests by status
//! - `gate_upstream_request_duration_seconds` (histogram): upstream latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(allowed: bool, source: &'static str) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!("gate_decisions_total", "outcome" => outcome, "source" => source).increment(1);
}

/// `result` is one of `member`, `non_member`, `timeout`, `error`.
pub fn record_store_lookup(result: &'static str, start: Instant) {
    counter!("gate_store_lookups_total", "result" => result).increment(1);
    histogram!("gate_store_lookup_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_size(entries: usize) {
    gauge!("gate_cache_entries").set(entries as f64);
}

pub fn record_denial(mode: &'static str) {
    counter!("gate_denials_total", "mode" => mode).increment(1);
}

pub fn record_upstream(status: u16, start: Instant) {
    counter!("gate_upstream_requests_total", "status" => status.to_string()).increment(1);
    histogram!("gate_upstream_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
