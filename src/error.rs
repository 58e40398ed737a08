use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Everything that can go wrong while serving a relay request.
///
/// Each variant maps to exactly one HTTP status in [`IntoResponse`], so
/// handlers can simply propagate with `?`.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The `url` parameter is missing, unparsable or not an allowed target.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// Connection-level failure before any response arrived.
    #[error("Upstream unreachable: {url}: {source}")]
    UpstreamUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered a manifest fetch with a non-success status.
    #[error("Upstream returned {status} for {url}")]
    UpstreamHttpError { status: StatusCode, url: String },

    /// The upstream body failed mid-transfer.
    #[error("Upstream stream interrupted: {url}: {source}")]
    StreamInterrupted {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    /// Classify a reqwest failure that happened before or while reading a body.
    pub fn from_fetch(url: &str, source: reqwest::Error, body_started: bool) -> Self {
        if source.is_timeout() {
            ProxyError::UpstreamTimeout(url.to_string())
        } else if body_started {
            ProxyError::StreamInterrupted {
                url: url.to_string(),
                source,
            }
        } else {
            ProxyError::UpstreamUnreachable {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Whether the failure originated at the upstream rather than the request.
    pub fn is_upstream(&self) -> bool {
        !matches!(
            self,
            ProxyError::InvalidTarget(_) | ProxyError::UnknownChannel(_)
        )
    }

    /// HTTP status this error is surfaced as.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::UnknownChannel(_) => StatusCode::NOT_FOUND,
            ProxyError::UpstreamTimeout(_)
            | ProxyError::UpstreamUnreachable { .. }
            | ProxyError::StreamInterrupted { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamHttpError { status, .. } => {
                if status.is_client_error() || status.is_server_error() {
                    *status
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }

        (status, format!("{}\n", self)).into_response()
    }
}
