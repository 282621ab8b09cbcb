//! Synthesis boundary: model provider, synthesis backend, scoped resources.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ModelProvider (trait)         SynthesisBackend (trait)  │
//! │  voice id ──▶ ModelHandle ───▶ text + context ──▶ audio  │
//! │                                      │                   │
//! │                                      ▼                   │
//! │                         ResourceTracker / ComputeLease   │
//! │                         (scratch memory, per call)       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Real model loading and neural inference live outside this crate.
//! [`StaticModelProvider`] and [`ToneSynthesizer`] are self-contained
//! implementations used by the demo binary and the tests.

pub mod backend;
pub mod lease;
pub mod model;
pub mod serialized;
pub mod tone;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use backend::{SynthesisBackend, SynthesisError, SynthesisRequest, SynthesizedAudio};
pub use lease::{ComputeLease, ResourceTracker};
pub use model::{
    ModelError, ModelFormat, ModelHandle, ModelKind, ModelMetadata, ModelProvider, Quantization,
    StaticModelProvider,
};
pub use serialized::SerializedBackend;
pub use tone::{ToneConfig, ToneSynthesizer};

// test-only re-export so render tests can use the mock without the full path.
#[cfg(test)]
pub use backend::{MockSynthesizer, RecordedCall};
