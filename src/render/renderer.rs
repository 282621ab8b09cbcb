//! Render entry points.
//!
//! [`AudioRenderer`] owns the collaborators every render needs (model
//! provider, synthesis backend, timing aligner and resource tracker) and
//! exposes the three operations editors call:
//!
//! ```text
//! stream_segment(segment)        ──▶ SegmentStream   (lazy AudioChunks)
//! re_render_word(segment, i, s)  ──▶ AudioChunk      (one word, same slot)
//! stream_concatenate(streams)    ──▶ Stream<Vec<f32>> (mixed buffers)
//! ```
//!
//! The renderer is cheap to clone; clones share the backend, the provider
//! and the resource counters.

use std::sync::Arc;

use futures::Stream;

use super::error::RenderError;
use super::rerender;
use super::streamer::{self, SegmentStream, StreamOptions};
use crate::audio::{AudioChunk, TimingAligner};
use crate::config::RenderConfig;
use crate::merge::{merge_streams, MergeOptions};
use crate::subtitle::{RenderOptions, Segment};
use crate::synth::{ModelProvider, ResourceTracker, SynthesisBackend};

/// Renders subtitle segments to timed audio.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use futures::StreamExt;
/// use timed_tts::config::RenderConfig;
/// use timed_tts::render::{AudioRenderer, StreamOptions};
/// use timed_tts::subtitle::{RenderOptions, Segment, Word};
/// use timed_tts::synth::{ModelMetadata, StaticModelProvider, ToneSynthesizer};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RenderConfig::default();
/// let models = StaticModelProvider::new().with_model(ModelMetadata::tts("default", 24_000));
/// let backend = ToneSynthesizer::new(config.tone, Default::default());
/// let renderer = AudioRenderer::new(Arc::new(models), Arc::new(backend), &config);
///
/// let segment = Segment::new("1", 0.0, 1.0, vec![Word::new("hello", 0.0, 1.0)]);
/// let mut stream = renderer.stream_segment(segment, RenderOptions::default(), StreamOptions::default());
/// while let Some(chunk) = stream.next().await {
///     let chunk = chunk?;
///     println!("{:.2}s +{:.2}s", chunk.timestamp, chunk.duration);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AudioRenderer {
    pub(crate) models: Arc<dyn ModelProvider>,
    pub(crate) backend: Arc<dyn SynthesisBackend>,
    pub(crate) aligner: TimingAligner,
    pub(crate) resources: ResourceTracker,
    merge: MergeOptions,
}

impl AudioRenderer {
    /// Build a renderer at the configured timeline rate.
    ///
    /// `config` should already be [`sanitized`](RenderConfig::sanitized).
    pub fn new(
        models: Arc<dyn ModelProvider>,
        backend: Arc<dyn SynthesisBackend>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            models,
            backend,
            aligner: TimingAligner::new(config.audio.sample_rate, config.stretch),
            resources: ResourceTracker::new(),
            merge: config.merge_options(0.0),
        }
    }

    /// Use `resources` for the renderer's per-chunk scratch leases, usually
    /// the tracker the backend was built with.
    pub fn with_resources(mut self, resources: ResourceTracker) -> Self {
        self.resources = resources;
        self
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    /// Timeline sample rate of every chunk this renderer emits.
    pub fn sample_rate(&self) -> u32 {
        self.aligner.sample_rate()
    }

    /// Lazily render `segment` chunk by chunk.
    ///
    /// Nothing is synthesized until the stream is polled.  Chunk durations
    /// sum to the segment's duration when `render.use_word_timings` is set.
    pub fn stream_segment(
        &self,
        segment: Segment,
        render: RenderOptions,
        options: StreamOptions,
    ) -> SegmentStream {
        streamer::stream_segment(self.clone(), segment, render, options)
    }

    /// Re-synthesize word `word_index` as `new_text`, fitted to the original
    /// word's timestamp and duration.
    pub async fn re_render_word(
        &self,
        segment: &Segment,
        word_index: usize,
        new_text: &str,
        render: &RenderOptions,
    ) -> Result<AudioChunk, RenderError> {
        rerender::re_render_word(self, segment, word_index, new_text, render).await
    }

    /// Mix several chunk streams into buffers of at most
    /// `options.max_buffer_size` samples, starting at timeline time zero.
    pub fn stream_concatenate<S>(
        &self,
        producers: Vec<S>,
        options: &StreamOptions,
    ) -> impl Stream<Item = Result<Vec<f32>, RenderError>> + Send + 'static
    where
        S: Stream<Item = Result<AudioChunk, RenderError>> + Unpin + Send + 'static,
    {
        let merge = MergeOptions {
            capacity: options.max_buffer_size,
            sample_rate: self.sample_rate(),
            ..self.merge.clone()
        };
        merge_streams(producers, merge)
    }
}

impl std::fmt::Debug for AudioRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRenderer")
            .field("aligner", &self.aligner)
            .field("resources", &self.resources)
            .field("merge", &self.merge)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
