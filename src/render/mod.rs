//! Segment rendering: chunking, synthesis, alignment and streaming.
//!
//! # Flow
//!
//! ```text
//! Segment ──▶ WordChunker ──▶ for each chunk:
//!                               BufferGauge ok?       [Backpressured]
//!                               backend.synthesize    [Synthesizing]
//!                               aligner.align_in_slot [Aligning]
//!                               yield AudioChunk      [Emitted]
//!                             ──▶ [Done]
//! ```
//!
//! Any failure ends the stream with a [`RenderError`] carrying a
//! [`ResumePoint`]; dropping the stream ends it as [`RenderState::Aborted`].

pub mod backpressure;
pub mod chunker;
pub mod error;
mod renderer;
mod rerender;
pub mod state;
pub mod streamer;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use backpressure::BufferGauge;
pub use chunker::{context_around, WordChunk, WordChunker, CONTEXT_WORDS, DEFAULT_CHUNK_SIZE};
pub use error::{RenderError, ResumePoint};
pub use renderer::AudioRenderer;
pub use state::{RenderState, SessionHandle, SessionSnapshot};
pub use streamer::{
    ChunkCallback, ProgressCallback, SegmentStream, StreamOptions, DEFAULT_MAX_BUFFER_SIZE,
};
