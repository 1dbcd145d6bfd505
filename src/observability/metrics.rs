//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by mode and status
//! - `relay_request_duration_seconds` (histogram): time to response head, by mode
//! - `relay_stream_chunks_total` (counter): upstream chunks relayed
//! - `relay_stream_errors_total` (counter): streams ended by an upstream error
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint. Needs a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished relay request. `mode` is `"none"` when rejected before classification.
pub fn record_request(mode: &'static str, status: u16, start_time: Instant) {
    counter!("relay_requests_total", "mode" => mode, "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds", "mode" => mode)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_stream_chunk() {
    counter!("relay_stream_chunks_total").increment(1);
}

pub fn record_stream_error() {
    counter!("relay_stream_errors_total").increment(1);
}
