//! Chapter segmentation.
//!
//! Splits a stripped text blob into an ordered, addressable chapter list by
//! scanning for heading lines ("CHAPTER IV", "Part 2", ...). When fewer than
//! two headings turn up the heading pass is considered unreliable and the
//! text is sliced into fixed-size pages with synthetic titles instead.
//!
//! Known limitation: the heading pattern only understands English marker
//! words with Roman or Arabic numerals. Documents using other conventions
//! fall through to the page fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Heading lines: a chapter/part marker word followed by a Roman or Arabic
/// numeral token, anchored at line start, case-insensitive.
static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(?:CHAPTER|PART)\s+[IVXLCDM0-9]+\.?[^\n]*").unwrap());

/// One chapter of a segmented document. `index` is 0-based, contiguous, and
/// stable once assigned; it doubles as the navigation and cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub content: String,
}

/// Tunables for the page fallback. The defaults match the values the reader
/// has always shipped with; there is no documented rationale for them, which
/// is exactly why they are configuration rather than constants.
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Character count per fallback page.
    pub page_size: usize,
    /// Hard cap on fallback page count; excess content is dropped.
    pub max_pages: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            page_size: 5000,
            max_pages: 50,
        }
    }
}

/// Segment stripped text into ordered chapters.
///
/// Deterministic: identical input yields byte-for-byte identical output, so
/// the result can be cached and reused indefinitely.
pub fn segment_chapters(text: &str, options: SegmentOptions) -> Vec<Chapter> {
    let headings: Vec<(usize, &str)> = RE_HEADING
        .find_iter(text)
        .map(|found| (found.start(), found.as_str().trim()))
        .collect();

    if headings.len() < 2 {
        debug!(
            headings = headings.len(),
            "Too few headings; falling back to fixed-size pages"
        );
        return paginate_fallback(text, options);
    }

    debug!(headings = headings.len(), "Segmenting by detected headings");
    headings
        .iter()
        .enumerate()
        .map(|(i, (start, title))| {
            let end = headings
                .get(i + 1)
                .map(|(next_start, _)| *next_start)
                .unwrap_or(text.len());
            Chapter {
                index: i,
                title: (*title).to_string(),
                content: text[*start..end].trim().to_string(),
            }
        })
        .collect()
}

/// Slice text into pages of `page_size` characters with synthetic titles.
/// The last page may be shorter; content past `max_pages` is dropped.
fn paginate_fallback(text: &str, options: SegmentOptions) -> Vec<Chapter> {
    let page_size = options.page_size.max(1);
    let mut pages = Vec::new();
    let mut rest = text;

    while !rest.is_empty() && pages.len() < options.max_pages {
        let cut = rest
            .char_indices()
            .nth(page_size)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(rest.len());
        let (page, tail) = rest.split_at(cut);
        pages.push(Chapter {
            index: pages.len(),
            title: format!("Section {}", pages.len() + 1),
            content: page.trim().to_string(),
        });
        rest = tail;
    }

    if !rest.is_empty() {
        warn!(
            dropped_chars = rest.chars().count(),
            max_pages = options.max_pages,
            "Text exceeds page cap; truncating remainder"
        );
    }

    pages
}
