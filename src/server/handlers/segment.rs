use super::{TargetParams, observe};
use crate::{
    error::Result,
    server::{state::AppState, target::parse_target},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::Response,
};
use futures_util::TryStreamExt;
use std::time::Instant;
use tracing::{debug, warn};

/// Upstream response headers that never reach the client.
///
/// Hop-by-hop headers belong to the upstream connection only. The body is
/// relayed as raw bytes with fresh framing, so `content-encoding` is dropped
/// too.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "content-encoding",
    "transfer-encoding",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Stream the resource named by `?url=` back to the player.
///
/// Status and filtered headers are sent as soon as upstream answers; the
/// body follows chunk by chunk. If upstream breaks mid-body the connection
/// is aborted, since the status line is already committed.
pub async fn serve_segment(
    Query(params): Query<TargetParams>,
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let result = relay_segment(
        &state,
        params.url.as_deref(),
        request_headers.get(header::RANGE),
    )
    .await;

    observe("segment", start, &result);
    result
}

async fn relay_segment(
    state: &AppState,
    raw_url: Option<&str>,
    range: Option<&HeaderValue>,
) -> Result<Response> {
    let target = parse_target(raw_url, state.config.block_private_targets)?;
    debug!("Relaying segment: {}", target);

    let upstream = state.upstream.open_stream(&target, range).await?;
    let status = upstream.status;
    let headers = relay_headers(&upstream.headers);

    let body = upstream
        .into_body_stream()
        .inspect_err(move |e| warn!("Aborting relay of {}: {}", target, e));

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    Ok(response)
}

/// Copy upstream headers minus the hop-by-hop set, forcing a permissive CORS origin.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len() + 1);

    for (name, value) in upstream {
        if !HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            headers.append(name.clone(), value.clone());
        }
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers
}
