use super::{TargetParams, observe};
use crate::{
    error::{ProxyError, Result},
    manifest::{self, ManifestFormat},
    server::{state::AppState, target::parse_target},
};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;
use url::Url;

/// Fetch and rewrite the manifest named by `?url=`.
pub async fn serve_playlist(
    Query(params): Query<TargetParams>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let result = match parse_target(params.url.as_deref(), state.config.block_private_targets) {
        Ok(target) => relay_manifest(&state, target).await,
        Err(e) => Err(e),
    };

    observe("playlist", start, &result);
    result
}

/// Fetch and rewrite a preset channel's manifest.
///
/// Preset URLs come from operator config and skip target validation.
pub async fn serve_channel(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();

    let result = match state.config.channels.get(&name) {
        Some(target) => {
            info!("Serving channel: {}", name);
            relay_manifest(&state, target.clone()).await
        }
        None => Err(ProxyError::UnknownChannel(name)),
    };

    observe("channel", start, &result);
    result
}

async fn relay_manifest(state: &AppState, target: Url) -> Result<Response> {
    info!("Fetching manifest from origin: {}", target);

    let fetched = state.upstream.fetch_text(&target).await?;
    let content_type = fetched.content_type.as_deref();

    // A redirect may reveal the real extension
    let format = match ManifestFormat::detect(&target, content_type) {
        ManifestFormat::Hls => ManifestFormat::detect(&fetched.final_url, content_type),
        ManifestFormat::Dash => ManifestFormat::Dash,
    };

    let rewritten =
        manifest::rewrite_manifest(&fetched.body, &fetched.final_url, format, &state.linker);

    info!(
        "Rewrote {} manifest from {} ({} bytes)",
        format.name(),
        fetched.final_url,
        rewritten.len()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        rewritten,
    )
        .into_response())
}
