//! Session bridge.
//!
//! Observer surfaces (a reader screen, a mini-player, a detail view) share
//! one playback session but open documents independently. The bridge gives
//! them a uniform way in: load the chapter list for a document (cache first,
//! network second), then either attach to the session already playing that
//! document or start a fresh local reading position without touching
//! playback. Surfaces never mutate session state; they call the manager's
//! operations and re-render from snapshots.

use crate::cache;
use crate::config::AppConfig;
use crate::playback::{Lifecycle, PlaybackManager, SessionKey, SourceRef};
use crate::segment::{Chapter, SegmentOptions, segment_chapters};
use crate::source;
use crate::strip::strip_boundaries;
use crate::tokenize::tokenize_units;
use anyhow::{Result, bail};
use tracing::{debug, info};

/// Identity of a document a surface wants to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub book_id: String,
    pub title: Option<String>,
    /// Where the raw text can be fetched if the cache is cold; `None` for
    /// documents ingested locally.
    pub text_url: Option<String>,
}

/// Everything a surface needs to render one document's reading view.
#[derive(Debug, Clone)]
pub struct ReaderView {
    pub chapters: Vec<Chapter>,
    pub chapter_index: usize,
    pub units: Vec<String>,
    pub unit_index: usize,
    pub lifecycle: Lifecycle,
    /// True when the view reflects the live playback session rather than a
    /// fresh local position.
    pub attached: bool,
}

/// Shared entry point for observer surfaces.
#[derive(Clone)]
pub struct SessionBridge {
    manager: PlaybackManager,
    segment_options: SegmentOptions,
    min_unit_chars: usize,
    fetch_timeout_secs: u64,
}

impl SessionBridge {
    pub fn new(manager: PlaybackManager, config: &AppConfig) -> Self {
        Self {
            manager,
            segment_options: SegmentOptions {
                page_size: config.page_size,
                max_pages: config.max_pages,
            },
            min_unit_chars: config.min_unit_chars,
            fetch_timeout_secs: config.fetch_timeout_secs,
        }
    }

    pub fn manager(&self) -> &PlaybackManager {
        &self.manager
    }

    /// Segment raw text (local file, paste, test fixture) into chapters and
    /// cache them under the document's identity.
    pub fn ingest_text(&self, doc: &DocumentRef, raw: &str) -> Vec<Chapter> {
        let stripped = strip_boundaries(raw);
        let chapters = segment_chapters(stripped, self.segment_options);
        info!(
            book_id = %doc.book_id,
            chapters = chapters.len(),
            "Ingested document text"
        );
        cache::save_chapters(&doc.book_id, &chapters);
        chapters
    }

    /// Load the chapter list for a document. Cache hits skip the network
    /// entirely; misses fetch, strip, segment, and persist before returning.
    pub fn load_chapters(&self, doc: &DocumentRef) -> Result<Vec<Chapter>> {
        if let Some(chapters) = cache::load_chapters(&doc.book_id) {
            return Ok(chapters);
        }

        let Some(url) = doc.text_url.as_deref() else {
            bail!(
                "Document `{}` is not cached and has no source URL",
                doc.book_id
            );
        };
        let raw = source::fetch_text(url, self.fetch_timeout_secs)?;
        Ok(self.ingest_text(doc, &raw))
    }

    /// Open a document for rendering.
    ///
    /// If the live session already belongs to this document, the view adopts
    /// its unit list, index, and lifecycle so every surface shows the same
    /// thing. Otherwise the requested chapter (clamped into range) is
    /// tokenized into a fresh local position; playback is not started.
    pub fn open_document(&self, doc: &DocumentRef, requested_chapter: usize) -> Result<ReaderView> {
        let chapters = self.load_chapters(doc)?;

        let snapshot = self.manager.snapshot();
        if let Some(key) = &snapshot.key {
            if key.book_id == doc.book_id && !snapshot.units.is_empty() {
                debug!(
                    book_id = %doc.book_id,
                    chapter = key.chapter_index,
                    "Attaching to active session"
                );
                return Ok(ReaderView {
                    chapter_index: key.chapter_index.min(chapters.len().saturating_sub(1)),
                    chapters,
                    units: snapshot.units,
                    unit_index: snapshot.current_index,
                    lifecycle: snapshot.lifecycle,
                    attached: true,
                });
            }
        }

        let chapter_index = requested_chapter.min(chapters.len().saturating_sub(1));
        let units = chapters
            .get(chapter_index)
            .map(|chapter| tokenize_units(&chapter.content, self.min_unit_chars))
            .unwrap_or_default();
        debug!(
            book_id = %doc.book_id,
            chapter = chapter_index,
            units = units.len(),
            "Opened fresh reading position"
        );
        Ok(ReaderView {
            chapters,
            chapter_index,
            units,
            unit_index: 0,
            lifecycle: Lifecycle::Idle,
            attached: false,
        })
    }

    /// Start playback of one chapter, replacing any active session. The
    /// chapter index is clamped into the chapter list.
    pub fn play_chapter(
        &self,
        doc: &DocumentRef,
        chapters: &[Chapter],
        chapter_index: usize,
        start_unit: usize,
    ) {
        if chapters.is_empty() {
            return;
        }
        let chapter_index = chapter_index.min(chapters.len() - 1);
        let chapter = &chapters[chapter_index];
        let units = tokenize_units(&chapter.content, self.min_unit_chars);
        self.manager.play(
            units,
            start_unit,
            SessionKey {
                book_id: doc.book_id.clone(),
                chapter_index,
            },
            chapter.title.clone(),
            Some(SourceRef {
                book_title: doc.title.clone(),
                text_url: doc.text_url.clone(),
            }),
        );
    }

    /// Restart playback at the start of the following chapter, if there is
    /// one. Returns the new chapter index when navigation happened.
    pub fn next_chapter(&self, doc: &DocumentRef, chapters: &[Chapter]) -> Option<usize> {
        let current = self.active_chapter(doc)?;
        let target = current + 1;
        if target >= chapters.len() {
            return None;
        }
        self.play_chapter(doc, chapters, target, 0);
        Some(target)
    }

    /// Restart playback at the start of the preceding chapter, if there is
    /// one.
    pub fn prev_chapter(&self, doc: &DocumentRef, chapters: &[Chapter]) -> Option<usize> {
        let current = self.active_chapter(doc)?;
        let target = current.checked_sub(1)?;
        self.play_chapter(doc, chapters, target, 0);
        Some(target)
    }

    /// The chapter index the live session holds for this document, if any.
    fn active_chapter(&self, doc: &DocumentRef) -> Option<usize> {
        let snapshot = self.manager.snapshot();
        let key = snapshot.key?;
        (key.book_id == doc.book_id).then_some(key.chapter_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{CompletionFn, SpeakOptions, SpeechEngine};
    use std::fs;
    use std::sync::Arc;

    /// Engine that accepts every utterance and never completes it; sessions
    /// stay `Playing` until the test transitions them.
    struct SilentEngine;

    impl SpeechEngine for SilentEngine {
        fn speak(&self, _text: &str, _options: SpeakOptions, _on_complete: CompletionFn) {}
        fn cancel(&self) {}
    }

    fn bridge() -> SessionBridge {
        let config = AppConfig::default();
        let manager = PlaybackManager::new(Arc::new(SilentEngine), config.speech_rate);
        SessionBridge::new(manager, &config)
    }

    fn doc(book_id: &str) -> DocumentRef {
        DocumentRef {
            book_id: book_id.to_string(),
            title: Some("Test Book".to_string()),
            text_url: None,
        }
    }

    fn cleanup(book_id: &str) {
        let _ = fs::remove_dir_all(cache::hash_dir(book_id));
    }

    const RAW: &str = "*** START OF TEXT ***\n\
        CHAPTER I. Hello.\nSome words here to speak. More words over there.\n\
        CHAPTER II. Goodbye.\nFinal words of the story.\n\
        *** END OF TEXT ***";

    #[test]
    fn ingest_then_open_starts_a_fresh_idle_position() {
        let book_id = format!("bridge-fresh-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);

        let chapters = bridge.ingest_text(&doc, RAW);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "CHAPTER I. Hello.");
        assert_eq!(chapters[1].title, "CHAPTER II. Goodbye.");

        let view = bridge.open_document(&doc, 0).unwrap();
        assert!(!view.attached);
        assert_eq!(view.lifecycle, Lifecycle::Idle);
        assert_eq!(view.chapter_index, 0);
        assert_eq!(view.unit_index, 0);
        assert_eq!(
            view.units,
            vec!["Some words here to speak.", "More words over there."]
        );

        cleanup(&book_id);
    }

    #[test]
    fn open_attaches_to_matching_active_session() {
        let book_id = format!("bridge-attach-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);
        let chapters = bridge.ingest_text(&doc, RAW);

        bridge.play_chapter(&doc, &chapters, 1, 0);
        let view = bridge.open_document(&doc, 0).unwrap();

        // The requested chapter is ignored in favor of the live session.
        assert!(view.attached);
        assert_eq!(view.chapter_index, 1);
        assert_eq!(view.lifecycle, Lifecycle::Playing);
        // "CHAPTER II." survives the length filter (11 chars); "Goodbye." does not.
        assert_eq!(view.units, vec!["CHAPTER II.", "Final words of the story."]);
        assert_eq!(view.unit_index, 0);

        cleanup(&book_id);
    }

    #[test]
    fn open_does_not_attach_to_another_documents_session() {
        let pid = std::process::id();
        let first_id = format!("bridge-other-a-{pid}");
        let second_id = format!("bridge-other-b-{pid}");
        let bridge = bridge();
        let first = doc(&first_id);
        let second = doc(&second_id);

        let chapters = bridge.ingest_text(&first, RAW);
        bridge.ingest_text(&second, RAW);
        bridge.play_chapter(&first, &chapters, 0, 0);

        let view = bridge.open_document(&second, 1).unwrap();
        assert!(!view.attached);
        assert_eq!(view.lifecycle, Lifecycle::Idle);
        assert_eq!(view.chapter_index, 1);

        cleanup(&first_id);
        cleanup(&second_id);
    }

    #[test]
    fn requested_chapter_is_clamped_into_range() {
        let book_id = format!("bridge-clamp-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);
        bridge.ingest_text(&doc, RAW);

        let view = bridge.open_document(&doc, 99).unwrap();
        assert_eq!(view.chapter_index, 1);

        cleanup(&book_id);
    }

    #[test]
    fn uncached_document_without_url_is_an_error() {
        let bridge = bridge();
        let doc = doc("bridge-no-such-doc");
        assert!(bridge.load_chapters(&doc).is_err());
    }

    #[test]
    fn chapter_navigation_replays_from_unit_zero() {
        let book_id = format!("bridge-nav-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);
        let chapters = bridge.ingest_text(&doc, RAW);

        bridge.play_chapter(&doc, &chapters, 0, 1);
        assert_eq!(bridge.next_chapter(&doc, &chapters), Some(1));
        let snap = bridge.manager().snapshot();
        assert_eq!(snap.key.as_ref().map(|k| k.chapter_index), Some(1));
        assert_eq!(snap.current_index, 0);

        // Already at the last chapter.
        assert_eq!(bridge.next_chapter(&doc, &chapters), None);

        assert_eq!(bridge.prev_chapter(&doc, &chapters), Some(0));
        assert_eq!(bridge.prev_chapter(&doc, &chapters), None);

        cleanup(&book_id);
    }

    #[test]
    fn full_pipeline_from_marked_raw_text() {
        let book_id = format!("bridge-pipeline-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);
        let raw = "*** START OF TEXT ***\nCHAPTER I. Hello.\nSome words. More words.\nCHAPTER II. Goodbye.\nFinal words.\n*** END OF TEXT ***";

        let chapters = bridge.ingest_text(&doc, raw);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "CHAPTER I. Hello.");
        assert_eq!(chapters[1].title, "CHAPTER II. Goodbye.");

        let view = bridge.open_document(&doc, 0).unwrap();
        assert_eq!(view.units, vec!["Some words.", "More words."]);

        cleanup(&book_id);
    }

    #[test]
    fn stop_clears_attachment() {
        let book_id = format!("bridge-stop-{}", std::process::id());
        let bridge = bridge();
        let doc = doc(&book_id);
        let chapters = bridge.ingest_text(&doc, RAW);

        bridge.play_chapter(&doc, &chapters, 0, 0);
        bridge.manager().stop();

        let view = bridge.open_document(&doc, 0).unwrap();
        assert!(!view.attached);
        assert_eq!(view.lifecycle, Lifecycle::Idle);

        cleanup(&book_id);
    }
}
