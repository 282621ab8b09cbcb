//! Voice-model metadata and the model-provider boundary.
//!
//! Fetching, verifying and caching models belongs to an external subsystem.
//! The renderer only asks a [`ModelProvider`] for a [`ModelHandle`] by voice
//! id and passes that handle to the synthesis backend untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Tts,
    Vocoder,
    Encoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Onnx,
    Safetensors,
    Gguf,
    /// Procedural voice with no weights file.
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    F32,
    F16,
    Int8,
    Int4,
}

/// Static description of a voice model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Voice id the renderer asks for (e.g. `"en-narrator"`).
    pub id: String,
    pub name: String,
    pub version: String,
    pub kind: ModelKind,
    pub format: ModelFormat,
    /// Native output rate of the model, in Hz.
    pub sample_rate: u32,
    pub quantization: Quantization,
    /// Weights size in bytes (0 for builtin voices).
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ModelMetadata {
    /// Metadata for a weightless TTS voice at `sample_rate`.
    pub fn tts(id: impl Into<String>, sample_rate: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: "1".into(),
            kind: ModelKind::Tts,
            format: ModelFormat::Builtin,
            sample_rate,
            quantization: Quantization::F32,
            size_bytes: 0,
            checksum: None,
            url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable reference to a resolved model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHandle {
    metadata: Arc<ModelMetadata>,
}

impl ModelHandle {
    pub fn new(metadata: ModelMetadata) -> Self {
        Self {
            metadata: Arc::new(metadata),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.metadata.sample_rate
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

// ---------------------------------------------------------------------------
// ModelError / ModelProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("checksum mismatch for model {id}")]
    ChecksumMismatch { id: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Resolves voice ids to loaded models.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc<dyn ModelProvider>` by concurrent renders.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn get_model(&self, voice_id: &str) -> Result<ModelHandle, ModelError>;
}

// ---------------------------------------------------------------------------
// StaticModelProvider
// ---------------------------------------------------------------------------

/// In-memory registry of already-available models.
#[derive(Debug, Clone, Default)]
pub struct StaticModelProvider {
    models: HashMap<String, ModelHandle>,
}

impl StaticModelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metadata`, replacing any model with the same id.
    pub fn with_model(mut self, metadata: ModelMetadata) -> Self {
        self.insert(metadata);
        self
    }

    pub fn insert(&mut self, metadata: ModelMetadata) {
        self.models
            .insert(metadata.id.clone(), ModelHandle::new(metadata));
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[async_trait]
impl ModelProvider for StaticModelProvider {
    async fn get_model(&self, voice_id: &str) -> Result<ModelHandle, ModelError> {
        self.models
            .get(voice_id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(voice_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
