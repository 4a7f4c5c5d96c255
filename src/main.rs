//! Entry point for the book reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Wire the speech engine, playback manager, and session bridge together.
//! - Drive one command: catalog search, chapter listing, or read-aloud.

mod bridge;
mod cache;
mod config;
mod playback;
mod segment;
mod source;
mod speech;
mod strip;
mod tokenize;

use crate::bridge::{DocumentRef, SessionBridge};
use crate::config::load_config;
use crate::playback::{Lifecycle, PlaybackManager, PlaybackSnapshot};
use crate::speech::CommandEngine;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage:
  bookflow search <query>
  bookflow read <url-or-path> [--chapter N] [--start M] [--list]";

enum Cli {
    Search {
        query: String,
    },
    Read {
        target: String,
        chapter: usize,
        start_unit: usize,
        list_only: bool,
    },
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let cli = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    match cli {
        Cli::Search { query } => run_search(&query, &config),
        Cli::Read {
            target,
            chapter,
            start_unit,
            list_only,
        } => run_read(&target, chapter, start_unit, list_only, &config),
    }
}

fn run_search(query: &str, config: &config::AppConfig) -> Result<()> {
    let hits = source::search_catalog(query, config.fetch_timeout_secs);
    if hits.is_empty() {
        println!("No plain-text editions found for \"{query}\".");
        return Ok(());
    }
    for hit in &hits {
        let authors = if hit.authors.is_empty() {
            "Unknown".to_string()
        } else {
            hit.authors.join(", ")
        };
        println!("[{}] {} — {}", hit.id, hit.title, authors);
        println!("      {}", hit.text_url);
    }
    Ok(())
}

fn run_read(
    target: &str,
    chapter: usize,
    start_unit: usize,
    list_only: bool,
    config: &config::AppConfig,
) -> Result<()> {
    let engine = Arc::new(CommandEngine::new(config.speech_command.clone()));
    let manager = PlaybackManager::new(engine, config.speech_rate);
    let bridge = SessionBridge::new(manager, config);

    let doc = resolve_document(target, &bridge)?;
    let view = bridge.open_document(&doc, chapter)?;
    if view.chapters.is_empty() {
        return Err(anyhow!("Document `{target}` produced no chapters"));
    }

    if list_only {
        for chapter in &view.chapters {
            println!("{:>4}  {}", chapter.index, chapter.title);
        }
        return Ok(());
    }

    // Console surface: re-render a status line from every snapshot, and feed
    // the wait loop below so the process exits when playback settles.
    let (tx, rx) = mpsc::channel::<PlaybackSnapshot>();
    bridge.manager().subscribe(move |snapshot| {
        render_status(snapshot);
        let _ = tx.send(snapshot.clone());
    });

    let stop_manager = bridge.manager().clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received; stopping playback");
        stop_manager.stop();
    })
    .context("Failed to install interrupt handler")?;

    bridge.play_chapter(&doc, &view.chapters, chapter, start_unit);

    // Snapshots emitted before this loop starts are buffered by the channel,
    // so an immediate failure (or an all-filtered chapter) still terminates.
    for snapshot in rx {
        if snapshot.lifecycle == Lifecycle::Idle {
            break;
        }
    }
    Ok(())
}

/// Local paths are ingested into the cache up front so reading works without
/// a network; anything else is treated as a fetchable URL keyed by itself.
fn resolve_document(target: &str, bridge: &SessionBridge) -> Result<DocumentRef> {
    let path = Path::new(target);
    if path.exists() {
        let doc = DocumentRef {
            book_id: target.to_string(),
            title: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string()),
            text_url: None,
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read `{}`", path.display()))?;
        bridge.ingest_text(&doc, &raw);
        return Ok(doc);
    }

    if !target.starts_with("http://") && !target.starts_with("https://") {
        return Err(anyhow!("`{target}` is neither a local file nor a URL"));
    }
    Ok(DocumentRef {
        book_id: target.to_string(),
        title: None,
        text_url: Some(target.to_string()),
    })
}

fn render_status(snapshot: &PlaybackSnapshot) {
    let state = match snapshot.lifecycle {
        Lifecycle::Idle => "idle",
        Lifecycle::Playing => "playing",
        Lifecycle::Paused => "paused",
    };
    let title = snapshot.chapter_title.as_deref().unwrap_or("-");
    if snapshot.units.is_empty() {
        println!("[{state}] {title}");
        return;
    }
    println!(
        "[{state}] {title} ({}/{})",
        snapshot.current_index + 1,
        snapshot.units.len()
    );
    if let Some(unit) = snapshot.units.get(snapshot.current_index) {
        println!("  {unit}");
    }
}

fn parse_args() -> Result<Cli> {
    let mut args = env::args().skip(1);
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    match command.as_str() {
        "search" => {
            let query = args.collect::<Vec<_>>().join(" ");
            if query.trim().is_empty() {
                return Err(anyhow!(USAGE));
            }
            Ok(Cli::Search { query })
        }
        "read" => {
            let target = args.next().ok_or_else(|| anyhow!(USAGE))?;
            let mut chapter = 0;
            let mut start_unit = 0;
            let mut list_only = false;
            while let Some(flag) = args.next() {
                match flag.as_str() {
                    "--chapter" => chapter = parse_flag_value(&mut args, "--chapter")?,
                    "--start" => start_unit = parse_flag_value(&mut args, "--start")?,
                    "--list" => list_only = true,
                    other => return Err(anyhow!("Unknown flag `{other}`\n{USAGE}")),
                }
            }
            Ok(Cli::Read {
                target,
                chapter,
                start_unit,
                list_only,
            })
        }
        other => Err(anyhow!("Unknown command `{other}`\n{USAGE}")),
    }
}

fn parse_flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<usize> {
    args.next()
        .ok_or_else(|| anyhow!("`{flag}` requires a value"))?
        .parse::<usize>()
        .with_context(|| format!("`{flag}` requires a non-negative integer"))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
