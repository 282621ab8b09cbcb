//! Audio primitives: timed chunks, re-timing and mixing.
//!
//! # Pipeline
//!
//! ```text
//! SynthesizedAudio → convert_rate → time_stretch → AudioChunk → MixBuffer
//! ```
//!
//! Everything here is mono `f32`.  [`TimingAligner`] is the entry point used
//! by the renderer; [`MixBuffer`] is the accumulation buffer behind the
//! stream merger.

pub mod align;
pub mod buffer;
pub mod chunk;
pub mod resample;
pub mod stretch;

pub use align::{AlignError, TimingAligner};
pub use buffer::MixBuffer;
pub use chunk::{AudioChunk, ChunkMetadata, METADATA_VERSION};
pub use resample::{convert_rate, resample_linear, ResampleError};
pub use stretch::{time_stretch, StretchParams};
