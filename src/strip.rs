//! Archive boundary stripping.
//!
//! Texts fetched from Project Gutenberg wrap the actual work in licensing
//! boilerplate delimited by recognizable marker lines. This module cuts the
//! content down to what lies strictly between the first start marker and the
//! first end marker found after it. Texts without markers pass through
//! unchanged; that is the intended fallback, not an error.

use tracing::debug;

/// Start markers, checked in priority order. The first one found wins.
const START_MARKERS: &[&str] = &[
    "*** START OF",
    "***START OF",
    "START OF THE PROJECT GUTENBERG",
];

/// End markers, checked in priority order against the already-cut text.
const END_MARKERS: &[&str] = &["*** END OF", "***END OF", "END OF THE PROJECT GUTENBERG"];

/// Strip archival front and back matter from a raw text blob.
///
/// Discards everything up to and including the start-marker line, then
/// everything from the end marker onward. Each marker list is scanned in
/// order and the first matching marker is used, mirroring how the archive
/// varies its punctuation across editions.
pub fn strip_boundaries(raw: &str) -> &str {
    let mut text = raw;

    for marker in START_MARKERS {
        if let Some(idx) = text.find(marker) {
            let after_line = text[idx..]
                .find('\n')
                .map(|offset| idx + offset + 1)
                .unwrap_or(text.len());
            debug!(marker, offset = idx, "Found start boundary marker");
            text = &text[after_line..];
            break;
        }
    }

    for marker in END_MARKERS {
        if let Some(idx) = text.find(marker) {
            debug!(marker, offset = idx, "Found end boundary marker");
            text = &text[..idx];
            break;
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_header_and_footer() {
        let raw = "Produced by volunteers.\n*** START OF THE PROJECT GUTENBERG EBOOK ***\nActual content here.\n*** END OF THE PROJECT GUTENBERG EBOOK ***\nLicense text.";
        let stripped = strip_boundaries(raw);
        assert_eq!(stripped, "Actual content here.\n");
    }

    #[test]
    fn passes_through_without_markers() {
        let raw = "Just a plain document.\nNo archive markers anywhere.";
        assert_eq!(strip_boundaries(raw), raw);
    }

    #[test]
    fn handles_unspaced_marker_variant() {
        let raw = "header\n***START OF THE EBOOK\nbody\n***END OF THE EBOOK\nfooter";
        assert_eq!(strip_boundaries(raw), "body\n");
    }

    #[test]
    fn start_marker_on_last_line_leaves_nothing() {
        let raw = "preamble\n*** START OF THE PROJECT GUTENBERG EBOOK";
        assert_eq!(strip_boundaries(raw), "");
    }

    #[test]
    fn output_excludes_both_marker_lines() {
        let raw = "*** START OF TEXT ***\nkept\n*** END OF TEXT ***";
        let stripped = strip_boundaries(raw);
        assert!(!stripped.contains("START OF"));
        assert!(!stripped.contains("END OF"));
        assert_eq!(stripped, "kept\n");
    }
}
