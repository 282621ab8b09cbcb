//! Synthesis backend boundary.
//!
//! # Overview
//!
//! [`SynthesisBackend`] is the interface the renderer drives once per word
//! chunk.  It is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SynthesisBackend>` and shared by concurrent segment streams.
//!
//! The renderer does **not** serialise calls.  A backend that cannot be
//! invoked concurrently must be wrapped by the caller, for example in
//! [`super::SerializedBackend`].
//!
//! [`MockSynthesizer`] (available under `#[cfg(test)]`) returns a constant
//! signal whose length is proportional to the word count, and records every
//! request it receives.

use async_trait::async_trait;
use thiserror::Error;

use super::model::ModelHandle;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One synthesis call: the text to speak plus read-only prosody context.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    /// Words spoken just before `text`; not rendered.
    pub context_before: &'a str,
    /// Words spoken just after `text`; not rendered.
    pub context_after: &'a str,
    pub model: &'a ModelHandle,
    /// Speaking-rate hint (1.0 = normal).
    pub speed: f32,
}

/// Raw mono backend output at the backend's native rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    /// Natural length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// The model handle could not be used (unloaded, wrong kind, ...).
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Inference failed inside the backend.
    #[error("synthesis backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// SynthesisBackend trait
// ---------------------------------------------------------------------------

/// Turns text into raw audio.
///
/// # Contract
///
/// - Must be callable repeatedly; each call is independent.
/// - The output rate is reported in [`SynthesizedAudio::sample_rate`]; the
///   renderer converts it to the timeline rate.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

// Compile-time assertion: Box<dyn SynthesisBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SynthesisBackend>) {}
};

#[async_trait]
impl<B: SynthesisBackend + ?Sized> SynthesisBackend for std::sync::Arc<B> {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        (**self).synthesize(request).await
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// What a [`MockSynthesizer`] was asked to say.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub text: String,
    pub context_before: String,
    pub context_after: String,
    pub model_id: String,
    pub speed: f32,
}

/// A test double producing `samples_per_word × words` samples of a constant
/// `amplitude`, optionally failing on one call.
#[cfg(test)]
#[derive(Debug)]
pub struct MockSynthesizer {
    pub sample_rate: u32,
    pub samples_per_word: usize,
    pub amplitude: f32,
    /// Zero-based call index that fails with `SynthesisError::Backend`.
    pub fail_at: Option<usize>,
    calls: std::sync::Mutex<Vec<RecordedCall>>,
}

#[cfg(test)]
impl MockSynthesizer {
    pub fn new(sample_rate: u32, samples_per_word: usize) -> Self {
        Self {
            sample_rate,
            samples_per_word,
            amplitude: 0.25,
            fail_at: None,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SynthesisBackend for MockSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let index = {
            let mut calls = self
                .calls
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            calls.push(RecordedCall {
                text: request.text.to_string(),
                context_before: request.context_before.to_string(),
                context_after: request.context_after.to_string(),
                model_id: request.model.id().to_string(),
                speed: request.speed,
            });
            calls.len() - 1
        };

        if self.fail_at == Some(index) {
            return Err(SynthesisError::Backend(format!("mock failure at call {index}")));
        }

        let words = request.text.split_whitespace().count().max(1);
        Ok(SynthesizedAudio {
            samples: vec![self.amplitude; words * self.samples_per_word],
            sample_rate: self.sample_rate,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
