pub mod health;
pub mod playlist;
pub mod segment;

use crate::{error::Result, metrics};
use axum::response::Response;
use serde::Deserialize;
use std::time::Instant;

/// `?url=` query accepted by `/playlist` and `/segment`
#[derive(Debug, Deserialize)]
pub struct TargetParams {
    pub url: Option<String>,
}

/// Record request count, latency and upstream failures for a finished handler.
fn observe(endpoint: &'static str, start: Instant, result: &Result<Response>) {
    let status = match result {
        Ok(response) => response.status(),
        Err(e) => {
            if e.is_upstream() {
                metrics::record_upstream_error();
            }
            e.status()
        }
    };

    metrics::record_request(endpoint, status.as_u16());
    metrics::record_duration(endpoint, start);
}
