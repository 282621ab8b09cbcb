//! Time-coded subtitle data model.
//!
//! A [`Segment`] is one subtitle cue with word-level timing.  All times are
//! seconds on the subtitle timeline, stored as `f64` so that sums over long
//! files stay well inside the 1 µs tolerance the renderer works with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when checking word timing against segment bounds.
pub const TIMING_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

/// A single spoken word and its slot on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// End of the word's slot (`start + duration`).
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// ---------------------------------------------------------------------------
// SegmentError
// ---------------------------------------------------------------------------

/// A violated [`Segment`] invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("segment bounds are inverted: start {start:.3}s > end {end:.3}s")]
    InvertedBounds { start: f64, end: f64 },

    #[error("word {index} has a negative or non-finite duration ({duration})")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("word {index} starts at {start:.3}s, before the previous word ({previous:.3}s)")]
    OutOfOrder {
        index: usize,
        start: f64,
        previous: f64,
    },

    #[error("word {index} starts at {start:.3}s, before the segment start ({segment_start:.3}s)")]
    BeforeSegmentStart {
        index: usize,
        start: f64,
        segment_start: f64,
    },

    #[error("word {index} ends at {end:.3}s, after the segment end ({segment_end:.3}s)")]
    PastSegmentEnd {
        index: usize,
        end: f64,
        segment_end: f64,
    },
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One subtitle cue with its ordered, time-coded words.
///
/// # Example
///
/// ```rust
/// use timed_tts::subtitle::{Segment, Word};
///
/// let segment = Segment::new(
///     "cue-1",
///     0.0,
///     1.0,
///     vec![Word::new("hello", 0.0, 0.5), Word::new("world", 0.5, 0.5)],
/// );
/// assert_eq!(segment.text, "hello world");
/// assert!(segment.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub words: Vec<Word>,
}

impl Segment {
    /// Build a segment whose `text` is the space-joined word texts.
    pub fn new(id: impl Into<String>, start: f64, end: f64, words: Vec<Word>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: id.into(),
            start,
            end,
            text,
            words,
        }
    }

    /// Length of the segment on the timeline.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check the word-timing invariants.
    ///
    /// Gaps between words are legal; overlapping starts are not, and no word
    /// may leave the `[start, end]` bounds of the segment.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.start > self.end + TIMING_TOLERANCE {
            return Err(SegmentError::InvertedBounds {
                start: self.start,
                end: self.end,
            });
        }

        let mut previous: Option<f64> = None;
        for (index, word) in self.words.iter().enumerate() {
            if !word.duration.is_finite() || word.duration < 0.0 {
                return Err(SegmentError::InvalidDuration {
                    index,
                    duration: word.duration,
                });
            }
            if let Some(previous) = previous {
                if word.start < previous {
                    return Err(SegmentError::OutOfOrder {
                        index,
                        start: word.start,
                        previous,
                    });
                }
            }
            if word.start < self.start - TIMING_TOLERANCE {
                return Err(SegmentError::BeforeSegmentStart {
                    index,
                    start: word.start,
                    segment_start: self.start,
                });
            }
            if word.end() > self.end + TIMING_TOLERANCE {
                return Err(SegmentError::PastSegmentEnd {
                    index,
                    end: word.end(),
                    segment_end: self.end,
                });
            }
            previous = Some(word.start);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RenderOptions
// ---------------------------------------------------------------------------

/// Per-render voice settings supplied by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Voice / model identifier resolved through the model provider.
    pub voice: String,
    /// Speaking-rate hint passed to the synthesis backend (1.0 = normal).
    pub speed: f32,
    /// Send neighbouring words to the backend as prosody context.
    pub preserve_prosody: bool,
    /// Re-time synthesized audio to the subtitle word timing.  When `false`
    /// chunks keep their natural synthesized length.
    pub use_word_timings: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            voice: "default".into(),
            speed: 1.0,
            preserve_prosody: true,
            use_word_timings: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
