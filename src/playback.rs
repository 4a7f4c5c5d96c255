//! Playback session management.
//!
//! Exactly one speech session exists process-wide. The manager owns it
//! outright: every other component either reads a snapshot or requests a
//! transition through the operations here. Completion callbacks arrive from
//! the engine's worker thread after an arbitrary delay, so every
//! state-changing operation bumps a generation counter and every callback
//! re-validates the generation it captured at dispatch time; a stale callback
//! must never resurrect a stopped or replaced session.
//!
//! The underlying engines have no reliable native pause, so `pause` cancels
//! the in-flight utterance and `resume` re-speaks the current unit from its
//! start. That is a documented constraint of this design, not a bug.

use crate::speech::{SpeakOptions, SpeechEngine, SpeechOutcome};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Session lifecycle. `Idle` covers both "no session" and "session finished
/// or failed"; in the latter case the unit list and identity are retained so
/// observer surfaces can still render and restart it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Identifies which logical reading session the playback currently
/// represents; observers attach to a matching session instead of starting a
/// competing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub book_id: String,
    pub chapter_index: usize,
}

/// Pointer back to the originating document, carried so an observer surface
/// can rebuild the reading view from the snapshot alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRef {
    pub book_title: Option<String>,
    pub text_url: Option<String>,
}

/// Immutable view of the session, emitted to observers after every
/// transition.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub lifecycle: Lifecycle,
    pub units: Vec<String>,
    pub current_index: usize,
    pub key: Option<SessionKey>,
    pub chapter_title: Option<String>,
    pub source: Option<SourceRef>,
}

struct SessionState {
    lifecycle: Lifecycle,
    units: Vec<String>,
    current_index: usize,
    key: Option<SessionKey>,
    chapter_title: Option<String>,
    source: Option<SourceRef>,
    generation: u64,
}

impl SessionState {
    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            lifecycle: self.lifecycle,
            units: self.units.clone(),
            current_index: self.current_index,
            key: self.key.clone(),
            chapter_title: self.chapter_title.clone(),
            source: self.source.clone(),
        }
    }

    /// End of document or synthesis failure: stop speaking but keep the
    /// session identity so surfaces can still render it.
    fn settle_idle(&mut self) {
        self.lifecycle = Lifecycle::Idle;
    }

    fn clear(&mut self) {
        self.lifecycle = Lifecycle::Idle;
        self.units.clear();
        self.current_index = 0;
        self.key = None;
        self.chapter_title = None;
        self.source = None;
    }
}

type ObserverFn = Box<dyn Fn(&PlaybackSnapshot) + Send + 'static>;

/// Cloneable handle to the process-wide playback session.
pub struct PlaybackManager {
    state: Arc<Mutex<SessionState>>,
    observers: Arc<Mutex<Vec<ObserverFn>>>,
    engine: Arc<dyn SpeechEngine>,
    rate: f32,
}

impl Clone for PlaybackManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            observers: Arc::clone(&self.observers),
            engine: Arc::clone(&self.engine),
            rate: self.rate,
        }
    }
}

impl PlaybackManager {
    pub fn new(engine: Arc<dyn SpeechEngine>, rate: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                lifecycle: Lifecycle::Idle,
                units: Vec::new(),
                current_index: 0,
                key: None,
                chapter_title: None,
                source: None,
                generation: 0,
            })),
            observers: Arc::new(Mutex::new(Vec::new())),
            engine,
            rate,
        }
    }

    /// Register an observer; it is called with a snapshot after every
    /// transition, outside the session lock.
    pub fn subscribe(&self, observer: impl Fn(&PlaybackSnapshot) + Send + 'static) {
        lock(&self.observers).push(Box::new(observer));
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        lock(&self.state).snapshot()
    }

    /// Start a new session, preempting any existing one unconditionally.
    ///
    /// Installs the unit list and identity, clamps `start_index` into range,
    /// and begins speaking. An empty unit list installs the identity but
    /// settles Idle without speaking.
    pub fn play(
        &self,
        units: Vec<String>,
        start_index: usize,
        key: SessionKey,
        chapter_title: String,
        source: Option<SourceRef>,
    ) {
        let speak_generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.current_index = start_index.min(units.len().saturating_sub(1));
            state.units = units;
            state.chapter_title = Some(chapter_title);
            state.source = source;
            if state.units.is_empty() {
                info!(book_id = %key.book_id, "Play requested with no units; settling idle");
                state.key = Some(key);
                state.settle_idle();
                None
            } else {
                info!(
                    book_id = %key.book_id,
                    chapter = key.chapter_index,
                    start_index = state.current_index,
                    units = state.units.len(),
                    "Starting playback session"
                );
                state.key = Some(key);
                state.lifecycle = Lifecycle::Playing;
                Some(state.generation)
            }
        };

        self.engine.cancel();
        if let Some(generation) = speak_generation {
            self.speak_current(generation);
        }
        self.notify();
    }

    /// Valid only from `Playing`: cancel the in-flight utterance, keep index
    /// and identity so `resume` continues the same logical session.
    pub fn pause(&self) {
        {
            let mut state = lock(&self.state);
            if state.lifecycle != Lifecycle::Playing {
                return;
            }
            state.generation += 1;
            state.lifecycle = Lifecycle::Paused;
            debug!(index = state.current_index, "Paused playback");
        }
        self.engine.cancel();
        self.notify();
    }

    /// Valid only from `Paused`. Re-speaks the current unit from its start;
    /// mid-utterance resume is not available from the engines we target.
    pub fn resume(&self) {
        let speak_generation = {
            let mut state = lock(&self.state);
            if state.lifecycle != Lifecycle::Paused {
                return;
            }
            state.generation += 1;
            state.lifecycle = Lifecycle::Playing;
            debug!(index = state.current_index, "Resumed playback");
            state.generation
        };
        self.speak_current(speak_generation);
        self.notify();
    }

    /// Valid from any state: cancel speech and discard the session entirely.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.clear();
            info!("Stopped playback session");
        }
        self.engine.cancel();
        self.notify();
    }

    /// Move to `index`, clamped into the unit list. While `Playing` this
    /// restarts speech at the new index; while `Paused` or `Idle` it only
    /// moves the cursor. Without a loaded unit list it is a no-op.
    pub fn seek(&self, index: usize) {
        let speak_generation = {
            let mut state = lock(&self.state);
            if state.units.is_empty() {
                return;
            }
            state.generation += 1;
            state.current_index = index.min(state.units.len() - 1);
            debug!(index = state.current_index, "Seeked within session");
            (state.lifecycle == Lifecycle::Playing).then_some(state.generation)
        };

        self.engine.cancel();
        if let Some(generation) = speak_generation {
            self.speak_current(generation);
        }
        self.notify();
    }

    /// Advance one unit; a request past the last unit is a no-op.
    pub fn next(&self) {
        let target = {
            let state = lock(&self.state);
            if state.units.is_empty() || state.current_index + 1 >= state.units.len() {
                return;
            }
            state.current_index + 1
        };
        self.seek(target);
    }

    /// Step back one unit; a request before the first unit is a no-op.
    pub fn prev(&self) {
        let target = {
            let state = lock(&self.state);
            if state.units.is_empty() || state.current_index == 0 {
                return;
            }
            state.current_index - 1
        };
        self.seek(target);
    }

    /// Dispatch the current unit to the engine. `generation` must be the
    /// value stamped by the operation that decided to speak; the completion
    /// callback carries it back for re-validation.
    fn speak_current(&self, generation: u64) {
        let text = {
            let state = lock(&self.state);
            if state.generation != generation {
                return;
            }
            match state.units.get(state.current_index) {
                Some(unit) => unit.clone(),
                None => return,
            }
        };

        let manager = self.clone();
        self.engine.speak(
            &text,
            SpeakOptions { rate: self.rate },
            Box::new(move |outcome| manager.on_utterance_complete(generation, outcome)),
        );
    }

    /// Completion callback for one utterance. May fire long after the
    /// session moved on; the generation check decides whether it still
    /// speaks for the live session.
    fn on_utterance_complete(&self, generation: u64, outcome: SpeechOutcome) {
        match outcome {
            // Cancellation is always initiated by an operation that already
            // transitioned the state; nothing left to do.
            SpeechOutcome::Stopped => {}
            SpeechOutcome::Done => {
                let advance_generation = {
                    let mut state = lock(&self.state);
                    if state.generation != generation || state.lifecycle != Lifecycle::Playing {
                        debug!(generation, "Discarding stale utterance completion");
                        return;
                    }
                    if state.current_index + 1 < state.units.len() {
                        state.generation += 1;
                        state.current_index += 1;
                        Some(state.generation)
                    } else {
                        // End of document is a normal terminal condition.
                        info!("Reached end of unit list; session idle");
                        state.settle_idle();
                        None
                    }
                };
                if let Some(next_generation) = advance_generation {
                    self.speak_current(next_generation);
                }
                self.notify();
            }
            SpeechOutcome::Error(err) => {
                {
                    let mut state = lock(&self.state);
                    if state.generation != generation {
                        debug!(generation, "Discarding stale utterance error: {err}");
                        return;
                    }
                    // Fail-stop: synthesis errors are environment problems,
                    // not transient conditions worth retrying.
                    warn!("Speech synthesis failed; stopping session: {err}");
                    state.settle_idle();
                }
                self.notify();
            }
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        for observer in lock(&self.observers).iter() {
            observer(&snapshot);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
