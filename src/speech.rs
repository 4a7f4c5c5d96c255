//! Speech engine seam.
//!
//! The playback session consumes a deliberately narrow synthesis primitive:
//! speak one utterance, report exactly one outcome. Everything else — voices,
//! audio routing, platform quirks — stays behind this trait. The bundled
//! implementation shells out to an external synthesizer command per
//! utterance and kills the child process on cancellation.

use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Baseline words-per-minute at rate 1.0; scaled by [`SpeakOptions::rate`].
const BASE_WPM: f32 = 175.0;

/// How often the worker thread polls a running child process.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Per-utterance options.
#[derive(Debug, Clone, Copy)]
pub struct SpeakOptions {
    /// Speech rate multiplier; 1.0 is the synthesizer's natural pace.
    pub rate: f32,
}

/// The single outcome of one `speak` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The utterance played to completion.
    Done,
    /// The utterance was cancelled; never reported as an error.
    Stopped,
    /// Synthesis failed (missing binary, dead audio device, ...).
    Error(String),
}

pub type CompletionFn = Box<dyn FnOnce(SpeechOutcome) + Send + 'static>;

/// One-utterance-at-a-time synthesis primitive.
///
/// Contract: every `speak` call reports exactly one [`SpeechOutcome`] through
/// its completion callback, possibly from another thread. `cancel` may be
/// called at any time and resolves the in-flight utterance (if any) as
/// `Stopped`, never `Error`.
pub trait SpeechEngine: Send + Sync {
    fn speak(&self, text: &str, options: SpeakOptions, on_complete: CompletionFn);
    fn cancel(&self);
}

/// [`SpeechEngine`] backed by an external synthesizer command (espeak-ng by
/// default). Each utterance is one child process, invoked as
/// `<command> -s <wpm> <text>`; cancellation kills the child.
pub struct CommandEngine {
    command: String,
    inner: Arc<Mutex<EngineInner>>,
}

struct EngineInner {
    next_id: u64,
    active: Option<ActiveUtterance>,
}

struct ActiveUtterance {
    id: u64,
    child: Child,
}

impl CommandEngine {
    pub fn new(command: String) -> Self {
        Self {
            command,
            inner: Arc::new(Mutex::new(EngineInner {
                next_id: 0,
                active: None,
            })),
        }
    }

    fn spawn_child(&self, text: &str, options: SpeakOptions) -> Result<Child> {
        let wpm = (BASE_WPM * options.rate.clamp(0.25, 4.0)).round() as u32;
        Command::new(&self.command)
            .arg("-s")
            .arg(wpm.to_string())
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start speech command `{}`", self.command))
    }
}

impl SpeechEngine for CommandEngine {
    fn speak(&self, text: &str, options: SpeakOptions, on_complete: CompletionFn) {
        let child = match self.spawn_child(text, options) {
            Ok(child) => child,
            Err(err) => {
                warn!("Speech spawn failed: {err:#}");
                on_complete(SpeechOutcome::Error(format!("{err:#}")));
                return;
            }
        };

        let id = {
            let mut inner = lock_inner(&self.inner);
            // The session manager cancels before re-speaking, but a leftover
            // child must not outlive its replacement.
            if let Some(mut stale) = inner.active.take() {
                let _ = stale.child.kill();
                let _ = stale.child.wait();
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.active = Some(ActiveUtterance { id, child });
            id
        };
        debug!(utterance = id, chars = text.len(), "Speaking utterance");

        let shared = Arc::clone(&self.inner);
        thread::spawn(move || {
            let outcome = loop {
                thread::sleep(POLL_INTERVAL);
                let mut inner = lock_inner(&shared);
                match inner.active.as_mut() {
                    Some(active) if active.id == id => match active.child.try_wait() {
                        Ok(Some(status)) => {
                            inner.active = None;
                            if status.success() {
                                break SpeechOutcome::Done;
                            }
                            break SpeechOutcome::Error(format!(
                                "speech command exited with {status}"
                            ));
                        }
                        Ok(None) => {}
                        Err(err) => {
                            inner.active = None;
                            break SpeechOutcome::Error(err.to_string());
                        }
                    },
                    // Cancelled or replaced while we slept.
                    _ => break SpeechOutcome::Stopped,
                }
            };
            debug!(utterance = id, ?outcome, "Utterance finished");
            on_complete(outcome);
        });
    }

    fn cancel(&self) {
        let mut inner = lock_inner(&self.inner);
        if let Some(mut active) = inner.active.take() {
            debug!(utterance = active.id, "Cancelling in-flight utterance");
            let _ = active.child.kill();
            let _ = active.child.wait();
        }
    }
}

fn lock_inner(inner: &Arc<Mutex<EngineInner>>) -> MutexGuard<'_, EngineInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
