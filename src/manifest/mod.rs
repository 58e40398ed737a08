//! Manifest classification and reference rewriting.
//!
//! Both formats share the same pipeline:
//! 1. Derive the manifest base (origin + directory of the manifest path)
//! 2. Resolve each media reference against that base
//! 3. Replace it with a link to the relay's segment endpoint carrying the
//!    percent-encoded absolute URL as the `url` query parameter
//!
//! A reference that cannot be resolved is never fatal: it falls back to
//! naive concatenation and, failing that, is left untouched.

pub mod dash;
pub mod hls;

use crate::metrics;
use tracing::{debug, warn};
use url::Url;

/// MIME type for rewritten HLS playlists
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// MIME type for rewritten DASH manifests
pub const DASH_CONTENT_TYPE: &str = "application/dash+xml";

/// Path of the relay endpoint that rewritten references point at
pub const SEGMENT_PATH: &str = "/segment";

/// Manifest flavour, decided from the source URL before the body is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestFormat {
    Hls,
    Dash,
}

impl ManifestFormat {
    /// Classify a manifest by its URL path extension.
    ///
    /// `.mpd` (case-insensitive, query ignored) is DASH. Anything else is
    /// HLS unless the upstream explicitly labelled the body as DASH.
    pub fn detect(source: &Url, upstream_content_type: Option<&str>) -> Self {
        if source.path().to_ascii_lowercase().ends_with(".mpd") {
            return ManifestFormat::Dash;
        }

        match upstream_content_type {
            Some(ct) if ct.trim().to_ascii_lowercase().starts_with(DASH_CONTENT_TYPE) => {
                ManifestFormat::Dash
            }
            _ => ManifestFormat::Hls,
        }
    }

    /// Content type of the rewritten response
    pub fn content_type(self) -> &'static str {
        match self {
            ManifestFormat::Hls => HLS_CONTENT_TYPE,
            ManifestFormat::Dash => DASH_CONTENT_TYPE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ManifestFormat::Hls => "hls",
            ManifestFormat::Dash => "dash",
        }
    }
}

/// Builds relay links for resolved absolute URLs.
///
/// With an empty prefix the links are same-origin relative paths
/// (`/segment?url=...`), otherwise they are absolute on the public base.
#[derive(Clone, Debug, Default)]
pub struct SegmentLinker {
    prefix: String,
}

impl SegmentLinker {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            prefix: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Relay link for an absolute URL
    pub fn link(&self, absolute: &Url) -> String {
        format!(
            "{}{}?url={}",
            self.prefix,
            SEGMENT_PATH,
            urlencoding::encode(absolute.as_str())
        )
    }
}

/// Outcome of resolving one manifest reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Standard RFC 3986 resolution against the base succeeded
    Joined(Url),
    /// Resolution failed but `base + reference` parsed as a URL
    Concatenated(Url),
    /// Neither strategy produced a URL; the reference must pass through
    Unresolved,
}

/// Directory-equivalent base of a manifest URL.
///
/// Origin plus the path truncated after its last `/`. Query, fragment and
/// credentials are dropped. Returns `None` for URLs with an opaque origin.
pub fn manifest_base(source: &Url) -> Option<Url> {
    let path = source.path();
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };

    Url::parse(&format!("{}{}", source.origin().ascii_serialization(), dir)).ok()
}

/// Resolve a manifest reference against the manifest base.
///
/// Absolute references come back unchanged; query strings are preserved.
pub fn resolve_reference(base: &Url, reference: &str) -> Resolution {
    match base.join(reference) {
        Ok(url) => Resolution::Joined(url),
        Err(e) => {
            debug!("Join failed for {:?} against {}: {}", reference, base, e);
            match Url::parse(&format!("{}{}", base, reference)) {
                Ok(url) => Resolution::Concatenated(url),
                Err(_) => Resolution::Unresolved,
            }
        }
    }
}

/// Resolve a reference and turn it into a relay link.
///
/// Returns `None` when the reference has to be left as it was.
pub(crate) fn proxy_reference(
    base: &Url,
    reference: &str,
    linker: &SegmentLinker,
) -> Option<String> {
    match resolve_reference(base, reference) {
        Resolution::Joined(url) => Some(linker.link(&url)),
        Resolution::Concatenated(url) => {
            warn!(
                "Reference {:?} did not resolve cleanly, using concatenation: {}",
                reference, url
            );
            metrics::record_rewrite_fallback();
            Some(linker.link(&url))
        }
        Resolution::Unresolved => {
            warn!("Leaving unresolvable reference untouched: {:?}", reference);
            metrics::record_rewrite_fallback();
            None
        }
    }
}

/// Rewrite a fetched manifest so every media reference goes through the relay.
///
/// `source` is the final manifest URL (after redirects) and provides the
/// base for relative references.
pub fn rewrite_manifest(
    content: &str,
    source: &Url,
    format: ManifestFormat,
    linker: &SegmentLinker,
) -> String {
    let Some(base) = manifest_base(source) else {
        warn!("No usable base for {}, passing manifest through", source);
        return content.to_string();
    };

    match format {
        ManifestFormat::Hls => hls::rewrite_playlist(content, &base, linker),
        ManifestFormat::Dash => dash::rewrite_mpd(content, &base, linker),
    }
}
