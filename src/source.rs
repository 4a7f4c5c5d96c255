//! Remote text sources.
//!
//! Two network concerns live here: fetching the raw text of a book by URL,
//! and searching the Project Gutenberg catalog (via gutendex.com, no API key
//! needed) for a book with a plain-text edition. Both are read-only lookups
//! against public services, so every failure path degrades to "not found"
//! with a warning instead of surfacing an error to the caller.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const CATALOG_URL: &str = "https://gutendex.com/books/";
const USER_AGENT: &str = concat!("bookflow/", env!("CARGO_PKG_VERSION"));

/// Plain-text formats in preference order; the first one a catalog entry
/// offers wins.
const TEXT_FORMATS: [&str; 3] = [
    "text/plain; charset=utf-8",
    "text/plain; charset=us-ascii",
    "text/plain",
];

/// A catalog hit that offers a plain-text edition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogHit {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub text_url: String,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    results: Vec<CatalogBook>,
}

#[derive(Debug, Deserialize)]
struct CatalogBook {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<CatalogAuthor>,
    #[serde(default)]
    formats: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CatalogAuthor {
    #[serde(default)]
    name: String,
}

fn client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch the raw text of a document by URL. Returns the body as-is; archive
/// boilerplate stripping happens downstream.
pub fn fetch_text(url: &str, timeout_secs: u64) -> Result<String> {
    info!(url, "Fetching document text");
    let body = client(timeout_secs)?
        .get(url)
        .send()
        .and_then(|resp| resp.error_for_status())
        .with_context(|| format!("Failed to fetch `{url}`"))?
        .text()
        .with_context(|| format!("Failed to read body of `{url}`"))?;
    debug!(url, bytes = body.len(), "Fetched document text");
    Ok(body)
}

/// Search the catalog for books matching `query`, keeping only entries that
/// offer a plain-text edition. Network or decode failures yield an empty
/// list.
pub fn search_catalog(query: &str, timeout_secs: u64) -> Vec<CatalogHit> {
    let cleaned = clean_search_terms(query);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let client = match client(timeout_secs) {
        Ok(client) => client,
        Err(err) => {
            warn!("Catalog search unavailable: {err:#}");
            return Vec::new();
        }
    };

    let page = client
        .get(CATALOG_URL)
        .query(&[("search", cleaned.as_str())])
        .send()
        .and_then(|resp| resp.error_for_status())
        .and_then(|resp| resp.json::<CatalogPage>());
    let page = match page {
        Ok(page) => page,
        Err(err) => {
            warn!(query = %cleaned, "Catalog search failed: {err}");
            return Vec::new();
        }
    };

    let hits: Vec<CatalogHit> = page.results.into_iter().filter_map(hit_from_book).collect();
    info!(query = %cleaned, hits = hits.len(), "Catalog search finished");
    hits
}

/// Entries without a plain-text edition are unusable here and dropped.
fn hit_from_book(book: CatalogBook) -> Option<CatalogHit> {
    let text_url = TEXT_FORMATS
        .iter()
        .find_map(|format| book.formats.get(*format))
        .cloned()?;
    Some(CatalogHit {
        id: book.id.to_string(),
        title: book.title,
        authors: book.authors.into_iter().map(|a| a.name).collect(),
        text_url,
    })
}

/// Drop subtitles (anything after a colon) and parenthesized annotations so
/// titles like "Frankenstein: Or, The Modern Prometheus (Illustrated)" match
/// the catalog's plainer entries.
fn clean_search_terms(query: &str) -> String {
    let head = query.split(':').next().unwrap_or(query);
    let mut cleaned = String::with_capacity(head.len());
    let mut depth = 0usize;
    for ch in head.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(ch),
            _ => {}
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
