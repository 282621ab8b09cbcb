//! Subtitle data model consumed by the renderer.
//!
//! Parsing subtitle files is the editor's job; this module only defines the
//! in-memory shape ([`Segment`] / [`Word`]) and its invariants.

pub mod types;

pub use types::{RenderOptions, Segment, SegmentError, Word, TIMING_TOLERANCE};
