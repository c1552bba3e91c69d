//! Metrics collection and exposition.
//!
//! # Metrics
//! - `logger_records_dropped_total` (counter): records shed by a sink, by `sink`
//! - `logger_delivery_failures_total` (counter): bus messages that exhausted retries
//! - `watchlist_requests_total` (counter): RPCs by `operation`, `status`
//! - `watchlist_request_duration_seconds` (histogram): RPC latency by `operation`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_dropped(sink: &'static str) {
    metrics::counter!("logger_records_dropped_total", "sink" => sink).increment(1);
}

pub fn record_delivery_failure() {
    metrics::counter!("logger_delivery_failures_total").increment(1);
}

pub fn record_request(operation: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "watchlist_requests_total",
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("watchlist_request_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
