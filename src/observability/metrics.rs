//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waf_requests_total` (counter): responses sent to clients by status
//! - `waf_verdicts_total` (counter): blocking verdicts by verdict and filter
//! - `waf_synthetic_responses_total` (counter): responses generated by the proxy
//! - `waf_synthetic_writes_dropped_total` (counter): 502s skipped on unwritable clients
//! - `waf_verdict_cache_entries` (gauge) / `waf_verdict_cache_evictions_total` (counter)
//! - `waf_upstream_failures_total` (counter): connect failures by group and server
//! - `waf_upstream_health` (gauge): 1=healthy, 0=unhealthy

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16) {
    counter!("waf_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_verdict(verdict: &str, filter: &str) {
    counter!(
        "waf_verdicts_total",
        "verdict" => verdict.to_string(),
        "filter" => filter.to_string()
    )
    .increment(1);
}

pub fn record_synthetic_response(status: u16) {
    counter!("waf_synthetic_responses_total", "status" => status.to_string()).increment(1);
}

pub fn record_dropped_write() {
    counter!("waf_synthetic_writes_dropped_total").increment(1);
}

pub fn record_verdict_cache_size(entries: usize) {
    gauge!("waf_verdict_cache_entries").set(entries as f64);
}

pub fn record_verdict_cache_eviction() {
    counter!("waf_verdict_cache_evictions_total").increment(1);
}

pub fn record_upstream_failure(group: &str, server: &str) {
    counter!(
        "waf_upstream_failures_total",
        "group" => group.to_string(),
        "server" => server.to_string()
    )
    .increment(1);
}

pub fn record_upstream_health(group: &str, server: &str, healthy: bool) {
    gauge!(
        "waf_upstream_health",
        "group" => group.to_string(),
        "server" => server.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
