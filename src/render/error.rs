//! Errors surfaced by the render entry points.
//!
//! Model and synthesis failures are fatal to the render that hit them: the
//! stream ends with the error instead of leaving a silent gap.  Each fatal
//! variant names the chunk that failed so the caller can resume from it
//! with [`StreamOptions::resume_from_chunk`](super::StreamOptions).

use thiserror::Error;

use crate::audio::AlignError;
use crate::subtitle::SegmentError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("voice model '{voice}' unavailable for segment {segment_id} (chunk {chunk_index}): {reason}")]
    ModelUnavailable {
        segment_id: String,
        voice: String,
        chunk_index: usize,
        word_start_index: usize,
        reason: String,
    },

    #[error("synthesis failed for segment {segment_id}, chunk {chunk_index} (word {word_start_index}): {reason}")]
    SynthesisFailure {
        segment_id: String,
        chunk_index: usize,
        word_start_index: usize,
        reason: String,
    },

    #[error("alignment failed for segment {segment_id}, chunk {chunk_index}: {source}")]
    Alignment {
        segment_id: String,
        chunk_index: usize,
        word_start_index: usize,
        #[source]
        source: AlignError,
    },

    #[error("segment {segment_id} is invalid: {source}")]
    InvalidSegment {
        segment_id: String,
        #[source]
        source: SegmentError,
    },

    #[error("word index {index} out of range for segment {segment_id} ({len} words)")]
    WordIndexOutOfRange {
        segment_id: String,
        index: usize,
        len: usize,
    },
}

/// Where to restart a failed render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub segment_id: String,
    /// Index of the first chunk that was not emitted.
    pub chunk_index: usize,
    /// Segment word index at which that chunk starts.
    pub word_start_index: usize,
}

impl RenderError {
    /// The unit of work to retry, for errors raised while rendering a chunk.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        match self {
            RenderError::ModelUnavailable {
                segment_id,
                chunk_index,
                word_start_index,
                ..
            }
            | RenderError::SynthesisFailure {
                segment_id,
                chunk_index,
                word_start_index,
                ..
            }
            | RenderError::Alignment {
                segment_id,
                chunk_index,
                word_start_index,
                ..
            } => Some(ResumePoint {
                segment_id: segment_id.clone(),
                chunk_index: *chunk_index,
                word_start_index: *word_start_index,
            }),
            RenderError::InvalidSegment { .. } | RenderError::WordIndexOutOfRange { .. } => None,
        }
    }

    /// Id of the segment the error belongs to.
    pub fn segment_id(&self) -> &str {
        match self {
            RenderError::ModelUnavailable { segment_id, .. }
            | RenderError::SynthesisFailure { segment_id, .. }
            | RenderError::Alignment { segment_id, .. }
            | RenderError::InvalidSegment { segment_id, .. }
            | RenderError::WordIndexOutOfRange { segment_id, .. } => segment_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_failure_has_resume_point() {
        let err = RenderError::SynthesisFailure {
            segment_id: "cue-3".into(),
            chunk_index: 2,
            word_start_index: 100,
            reason: "oom".into(),
        };
        let point = err.resume_point().unwrap();
        assert_eq!(point.chunk_index, 2);
        assert_eq!(point.word_start_index, 100);
        assert_eq!(err.segment_id(), "cue-3");
        assert!(err.to_string().contains("chunk 2"));
    }

    #[test]
    fn validation_errors_have_no_resume_point() {
        let err = RenderError::WordIndexOutOfRange {
            segment_id: "cue".into(),
            index: 9,
            len: 3,
        };
        assert!(err.resume_point().is_none());
        assert!(err.to_string().contains("9"));
    }

    #[test]
    fn invalid_segment_exposes_source() {
        use std::error::Error as _;
        let err = RenderError::InvalidSegment {
            segment_id: "cue".into(),
            source: SegmentError::InvertedBounds { start: 2.0, end: 1.0 },
        };
        assert!(err.source().is_some());
    }
}
