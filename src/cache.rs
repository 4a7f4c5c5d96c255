//! Chapter cache.
//!
//! Segmentation runs once per document; the resulting chapter list is stored
//! under `.cache/` using a hash of the book identifier as the directory name
//! to avoid filesystem issues. The payload is a JSON array of
//! `{index, title, content}` records. Reads treat any failure as a cache
//! miss; writes are best-effort so a full disk never blocks reading.

use crate::segment::Chapter;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CACHE_DIR: &str = ".cache";

pub fn hash_dir(book_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(book_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    Path::new(CACHE_DIR).join(hash)
}

fn chapters_path(book_id: &str) -> PathBuf {
    hash_dir(book_id).join("chapters.json")
}

/// Load the cached chapter list for a book, if present and well-formed.
pub fn load_chapters(book_id: &str) -> Option<Vec<Chapter>> {
    let path = chapters_path(book_id);
    let data = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Vec<Chapter>>(&data) {
        Ok(chapters) => {
            debug!(
                book_id,
                chapters = chapters.len(),
                "Loaded chapter list from cache"
            );
            Some(chapters)
        }
        Err(err) => {
            warn!(book_id, "Discarding corrupt chapter cache: {err}");
            None
        }
    }
}

/// Persist the chapter list for a book. Errors are logged and ignored.
pub fn save_chapters(book_id: &str, chapters: &[Chapter]) {
    let path = chapters_path(book_id);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_string(chapters) {
        Ok(payload) => {
            if let Err(err) = fs::write(&path, payload) {
                warn!(book_id, "Failed to write chapter cache: {err}");
            } else {
                debug!(book_id, chapters = chapters.len(), "Stored chapter cache");
            }
        }
        Err(err) => warn!(book_id, "Failed to serialize chapter cache: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_chapter_list() {
        let book_id = format!("cache-test-{}", std::process::id());
        let chapters = vec![
            Chapter {
                index: 0,
                title: "CHAPTER I".to_string(),
                content: "First chapter prose.".to_string(),
            },
            Chapter {
                index: 1,
                title: "CHAPTER II".to_string(),
                content: "Second chapter prose.".to_string(),
            },
        ];

        save_chapters(&book_id, &chapters);
        assert_eq!(load_chapters(&book_id), Some(chapters));

        let _ = fs::remove_dir_all(hash_dir(&book_id));
    }

    #[test]
    fn missing_cache_is_a_miss() {
        assert_eq!(load_chapters("no-such-book-id"), None);
    }

    #[test]
    fn corrupt_cache_is_a_miss() {
        let book_id = format!("cache-corrupt-{}", std::process::id());
        let path = chapters_path(&book_id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json at all").unwrap();

        assert_eq!(load_chapters(&book_id), None);

        let _ = fs::remove_dir_all(hash_dir(&book_id));
    }
}
