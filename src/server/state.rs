use crate::{config::Config, manifest::SegmentLinker, upstream::Upstream};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup
    pub config: Arc<Config>,
    /// Pooled client for all upstream fetches
    pub upstream: Upstream,
    /// Builds `/segment?url=` links for rewritten manifests
    pub linker: SegmentLinker,
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let upstream = Upstream::new(config.upstream_timeout, &config.user_agent)?;
        let linker = SegmentLinker::new(&config.base_url);

        Ok(Self {
            config: Arc::new(config),
            upstream,
            linker,
            metrics: crate::metrics::init(),
            started_at: Instant::now(),
        })
    }
}
