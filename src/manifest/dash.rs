//! DASH MPD rewriting.
//!
//! Only `media` and `initialization` attribute values (SegmentTemplate,
//! SegmentURL, Initialization) are touched. The rest of the document is
//! copied through as text, so periods, timelines and unknown elements are
//! preserved exactly.

use super::{SegmentLinker, proxy_reference};
use quick_xml::escape::unescape;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use url::Url;

static MEDIA_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(media|initialization)="([^"]+)""#).expect("media attribute pattern is valid")
});

/// Point every `media="…"` / `initialization="…"` value at the relay.
///
/// Attribute values are XML-unescaped before resolution (`&amp;` in query
/// strings). Values that cannot be resolved keep their original text.
pub fn rewrite_mpd(content: &str, base: &Url, linker: &SegmentLinker) -> String {
    MEDIA_ATTRIBUTE
        .replace_all(content, |caps: &Captures| {
            let attribute = &caps[1];
            let raw = &caps[2];
            let value = unescape(raw).unwrap_or(Cow::Borrowed(raw));

            match proxy_reference(base, &value, linker) {
                Some(link) => format!(r#"{attribute}="{link}""#),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
