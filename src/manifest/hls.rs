//! Line-based HLS playlist rewriting.
//!
//! Works on raw text rather than a parsed playlist so that unknown tags,
//! comments and blank lines survive byte-for-byte. Master and media
//! playlists are handled the same way: every URI line is a reference.

use super::{SegmentLinker, proxy_reference};
use url::Url;

/// Rewrite every URI line of an HLS playlist into a relay link.
///
/// Tag/comment lines (`#...`) and blank lines are copied verbatim. The
/// output has exactly as many lines as the input and keeps each line's
/// `\r\n` or `\n` terminator.
pub fn rewrite_playlist(content: &str, base: &Url, linker: &SegmentLinker) -> String {
    let mut output = String::with_capacity(content.len() * 2);

    for (idx, raw) in content.split('\n').enumerate() {
        if idx > 0 {
            output.push('\n');
        }

        let (line, cr) = match raw.strip_suffix('\r') {
            Some(line) => (line, "\r"),
            None => (raw, ""),
        };

        let reference = line.trim();
        if reference.is_empty() || reference.starts_with('#') {
            output.push_str(raw);
            continue;
        }

        match proxy_reference(base, reference, linker) {
            Some(link) => {
                output.push_str(&link);
                output.push_str(cr);
            }
            None => output.push_str(raw),
        }
    }

    output
}
