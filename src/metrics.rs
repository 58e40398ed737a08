//! Prometheus metrics for the relay.
//!
//! The recorder is installed once per process; every router built
//! afterwards shares the same handle for `/metrics` rendering.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder (idempotent) and return its handle.
pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            // Fails if another recorder is already installed; the handle
            // then renders an empty registry.
            let _ = metrics::set_global_recorder(recorder);
            handle
        })
        .clone()
}

/// Count a finished request by endpoint and status code
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!("relay_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}

/// Record handler latency for an endpoint
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("relay_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    counter!("relay_upstream_errors_total").increment(1);
}

/// A manifest reference needed the concatenation or passthrough fallback
pub fn record_rewrite_fallback() {
    counter!("relay_rewrite_fallbacks_total").increment(1);
}
