//! Serialised backend wrapper.
//!
//! The renderer may call one backend from several segment streams at once.
//! Backends whose compute handle is not safe for concurrent use are wrapped
//! in [`SerializedBackend`], which admits one call at a time.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::backend::{SynthesisBackend, SynthesisError, SynthesisRequest, SynthesizedAudio};

// ---------------------------------------------------------------------------
// SerializedBackend
// ---------------------------------------------------------------------------

/// Wraps any [`SynthesisBackend`] so that calls run strictly one after
/// another, in arrival order.
pub struct SerializedBackend<B: SynthesisBackend> {
    inner: B,
    gate: Mutex<()>,
}

impl<B: SynthesisBackend> SerializedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    /// Return a reference to the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: SynthesisBackend> std::fmt::Debug for SerializedBackend<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: SynthesisBackend> SynthesisBackend for SerializedBackend<B> {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let _turn = self.gate.lock().await;
        self.inner.synthesize(request).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
