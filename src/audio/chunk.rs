//! Timed audio chunks and their metadata.
//!
//! An [`AudioChunk`] is owned by exactly one pipeline stage at a time: the
//! aligner builds it, the streamer yields it, the merger consumes it.  It is
//! moved between stages, never shared.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current layout version of [`ChunkMetadata`].
pub const METADATA_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// ChunkMetadata
// ---------------------------------------------------------------------------

/// Provenance of a chunk: which subtitle and which words it renders.
///
/// The fixed fields are what the renderer itself relies on.  Collaborators
/// that need to attach their own annotations use `extensions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub version: u16,
    pub subtitle_id: String,
    /// Index of the first rendered word within the segment.
    pub word_start_index: usize,
    /// Index of the last rendered word (inclusive).
    pub word_end_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl ChunkMetadata {
    /// Metadata for words `start..=end` of subtitle `subtitle_id`.
    pub fn for_words(subtitle_id: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            subtitle_id: subtitle_id.into(),
            word_start_index: start,
            word_end_index: end,
            ..Self::default()
        }
    }

    /// Attach a collaborator-specific annotation.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Number of words covered.
    pub fn word_count(&self) -> usize {
        self.word_end_index.saturating_sub(self.word_start_index) + 1
    }
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            subtitle_id: String::new(),
            word_start_index: 0,
            word_end_index: 0,
            speaker: None,
            emotion: None,
            extensions: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// Mono `f32` audio placed at an absolute position on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    /// Start on the timeline, in seconds.
    pub timestamp: f64,
    /// Length on the timeline, in seconds.
    pub duration: f64,
    pub metadata: ChunkMetadata,
}

impl AudioChunk {
    /// End of the chunk on the timeline.
    pub fn end(&self) -> f64 {
        self.timestamp + self.duration
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_metadata_carries_current_version() {
        let meta = ChunkMetadata::default();
        assert_eq!(meta.version, METADATA_VERSION);
        assert!(meta.extensions.is_empty());
    }

    #[test]
    fn for_words_sets_range() {
        let meta = ChunkMetadata::for_words("cue-7", 50, 99);
        assert_eq!(meta.subtitle_id, "cue-7");
        assert_eq!(meta.word_start_index, 50);
        assert_eq!(meta.word_end_index, 99);
        assert_eq!(meta.word_count(), 50);
    }

    #[test]
    fn extensions_survive_serialization() {
        let meta = ChunkMetadata::for_words("cue", 0, 0)
            .with_extension("editor.take", json!(3));
        let text = serde_json::to_string(&meta).unwrap();
        let back: ChunkMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back.extensions.get("editor.take"), Some(&json!(3)));
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let text = serde_json::to_string(&ChunkMetadata::for_words("cue", 1, 2)).unwrap();
        assert!(!text.contains("speaker"));
        assert!(!text.contains("extensions"));
    }

    #[test]
    fn chunk_end_and_peak() {
        let chunk = AudioChunk {
            samples: vec![0.1, -0.7, 0.3],
            timestamp: 1.5,
            duration: 0.25,
            metadata: ChunkMetadata::default(),
        };
        assert!((chunk.end() - 1.75).abs() < 1e-12);
        assert!((chunk.peak() - 0.7).abs() < 1e-6);
        assert_eq!(chunk.len(), 3);
    }
}
