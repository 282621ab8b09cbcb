//! Render session state machine and its shared, observable snapshot.
//!
//! [`RenderState`] tracks one segment stream.  The streamer mutates it
//! through a [`SessionHandle`]; callers clone the handle to watch progress.
//!
//! ```text
//! Idle ──▶ Chunking ──▶ Synthesizing ──▶ Aligning ──▶ Emitted ─┐
//!              ▲                                              │
//!              └──────── Backpressured ◀──── (buffer full) ◀──┘
//! Emitted / Chunking ──last chunk──▶ Done
//! any state ──stream dropped──▶ Aborted
//! ```

use std::sync::{Arc, Mutex, PoisonError};

// ---------------------------------------------------------------------------
// RenderState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Stream created but not yet polled.
    #[default]
    Idle,
    /// Pulling the next word chunk.
    Chunking,
    /// Waiting on the synthesis backend.
    Synthesizing,
    /// Time-stretching synthesized audio into its slot.
    Aligning,
    /// A chunk was handed to the consumer.
    Emitted,
    /// Suspended until the consumer drains its buffer.
    Backpressured,
    /// Every chunk was emitted.
    Done,
    /// The stream was dropped or failed before completion.
    Aborted,
}

impl RenderState {
    /// Returns `true` until the stream has finished one way or another.
    ///
    /// ```
    /// use timed_tts::render::RenderState;
    ///
    /// assert!(RenderState::Idle.is_active());
    /// assert!(RenderState::Backpressured.is_active());
    /// assert!(!RenderState::Done.is_active());
    /// assert!(!RenderState::Aborted.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        !matches!(self, RenderState::Done | RenderState::Aborted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RenderState::Idle => "Idle",
            RenderState::Chunking => "Chunking",
            RenderState::Synthesizing => "Synthesizing",
            RenderState::Aligning => "Aligning",
            RenderState::Emitted => "Emitted",
            RenderState::Backpressured => "Backpressured",
            RenderState::Done => "Done",
            RenderState::Aborted => "Aborted",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of a render session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub state: RenderState,
    pub processed_words: usize,
    pub total_words: usize,
    pub chunks_emitted: usize,
    /// Timeline position (seconds) where the next chunk will start.
    pub cursor: f64,
}

impl SessionSnapshot {
    /// `processed_words / total_words`; an empty segment counts as complete
    /// once the stream is done.
    pub fn progress(&self) -> f64 {
        if self.total_words == 0 {
            return if self.state == RenderState::Done { 1.0 } else { 0.0 };
        }
        self.processed_words as f64 / self.total_words as f64
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle to a session's snapshot.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionSnapshot>>,
}

impl SessionHandle {
    pub(crate) fn new(total_words: usize, cursor: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionSnapshot {
                total_words,
                cursor,
                ..SessionSnapshot::default()
            })),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> RenderState {
        self.snapshot().state
    }

    pub(crate) fn set_state(&self, state: RenderState) {
        self.update(|s| s.state = state);
    }

    /// Mark the session aborted unless it already finished.
    pub(crate) fn abort(&self) {
        self.update(|s| {
            if s.state != RenderState::Done {
                s.state = RenderState::Aborted;
            }
        });
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
