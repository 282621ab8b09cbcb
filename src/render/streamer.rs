//! Segment streamer: chunk → synthesize → align → yield, one chunk at a time.
//!
//! A [`SegmentStream`] is lazy.  Nothing is synthesized until it is polled
//! and at most one chunk is in flight.  Dropping the stream cancels the
//! in-flight chunk; everything that chunk acquired is scoped to it and is
//! released with it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use log::debug;

use super::backpressure::BufferGauge;
use super::chunker::{WordChunker, DEFAULT_CHUNK_SIZE};
use super::error::RenderError;
use super::renderer::AudioRenderer;
use super::state::{RenderState, SessionHandle, SessionSnapshot};
use crate::audio::{AudioChunk, ChunkMetadata};
use crate::subtitle::{RenderOptions, Segment};
use crate::synth::{SynthesisError, SynthesisRequest};

/// Default consumer buffer ceiling: 10 s at 48 kHz.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 480_000;

pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;
pub type ChunkCallback = Arc<dyn Fn(&AudioChunk) + Send + Sync>;

// ---------------------------------------------------------------------------
// StreamOptions
// ---------------------------------------------------------------------------

/// Per-call streaming settings.
#[derive(Clone)]
pub struct StreamOptions {
    /// Maximum words per synthesis call.
    pub chunk_size: usize,
    /// Ceiling on samples the consumer may hold before the stream suspends.
    /// Also the capacity of merged output buffers.
    pub max_buffer_size: usize,
    /// Called with `processed_words / total_words` after every chunk.
    pub on_progress: Option<ProgressCallback>,
    /// Called with every chunk just before it is yielded.
    pub on_chunk: Option<ChunkCallback>,
    /// Consumer-reported buffer level; without it the stream is paced by
    /// polling alone.
    pub buffer_gauge: Option<BufferGauge>,
    /// Skip chunks before this index (retry after a failure).
    pub resume_from_chunk: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            on_progress: None,
            on_chunk: None,
            buffer_gauge: None,
            resume_from_chunk: 0,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("chunk_size", &self.chunk_size)
            .field("max_buffer_size", &self.max_buffer_size)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_chunk", &self.on_chunk.is_some())
            .field("buffer_gauge", &self.buffer_gauge)
            .field("resume_from_chunk", &self.resume_from_chunk)
            .finish()
    }
}

impl StreamOptions {
    pub fn with_progress(mut self, f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn with_chunk_callback(mut self, f: impl Fn(&AudioChunk) + Send + Sync + 'static) -> Self {
        self.on_chunk = Some(Arc::new(f));
        self
    }

    pub fn with_gauge(mut self, gauge: BufferGauge) -> Self {
        self.buffer_gauge = Some(gauge);
        self
    }

    pub fn resuming_at(mut self, chunk_index: usize) -> Self {
        self.resume_from_chunk = chunk_index;
        self
    }

    fn report_progress(&self, progress: f64) {
        if let Some(cb) = &self.on_progress {
            cb(progress);
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentStream
// ---------------------------------------------------------------------------

/// Lazy, finite stream of the aligned chunks of one segment.
///
/// Chunks come out in word order with non-decreasing timestamps.  The
/// stream ends after the last chunk or right after the first error.
pub struct SegmentStream {
    inner: Option<BoxStream<'static, Result<AudioChunk, RenderError>>>,
    session: SessionHandle,
}

impl SegmentStream {
    /// Handle for observing the session after the stream moves elsewhere.
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }
}

impl Stream for SegmentStream {
    type Item = Result<AudioChunk, RenderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for SegmentStream {
    fn drop(&mut self) {
        // Drop the generator first: its in-flight chunk releases its leases.
        drop(self.inner.take());
        self.session.abort();
    }
}

impl std::fmt::Debug for SegmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStream")
            .field("session", &self.session.snapshot())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub(crate) fn stream_segment(
    renderer: AudioRenderer,
    segment: Segment,
    render: RenderOptions,
    options: StreamOptions,
) -> SegmentStream {
    let session = SessionHandle::new(segment.words.len(), segment.start);
    let inner = render_chunks(renderer, segment, render, options, session.clone()).boxed();
    SegmentStream {
        inner: Some(inner),
        session,
    }
}

fn render_chunks(
    renderer: AudioRenderer,
    segment: Segment,
    render: RenderOptions,
    options: StreamOptions,
    session: SessionHandle,
) -> impl Stream<Item = Result<AudioChunk, RenderError>> + Send + 'static {
    try_stream! {
        session.set_state(RenderState::Chunking);

        if let Err(source) = segment.validate() {
            session.set_state(RenderState::Aborted);
            Err::<(), RenderError>(RenderError::InvalidSegment {
                segment_id: segment.id.clone(),
                source,
            })?;
        }

        let total_words = segment.words.len();
        if total_words == 0 {
            options.report_progress(1.0);
            session.update(|s| {
                s.state = RenderState::Done;
                s.cursor = segment.end;
            });
            debug!("render: segment {} has no words", segment.id);
            return;
        }

        let chunk_size = options.chunk_size.max(1);
        let chunk_count = total_words.div_ceil(chunk_size);
        let resume = options.resume_from_chunk.min(chunk_count);
        let resume_word = (resume * chunk_size).min(total_words);

        // Slots tile the segment: chunk k starts where chunk k-1's slot ended,
        // which is chunk k's first word.
        let mut cursor = if resume == 0 {
            segment.start
        } else {
            segment.words.get(resume_word).map_or(segment.end, |w| w.start)
        };
        let mut processed = resume_word;
        session.update(|s| {
            s.processed_words = processed;
            s.cursor = cursor;
        });

        let model = renderer
            .models
            .get_model(&render.voice)
            .await
            .map_err(|e| {
                session.set_state(RenderState::Aborted);
                RenderError::ModelUnavailable {
                    segment_id: segment.id.clone(),
                    voice: render.voice.clone(),
                    chunk_index: resume,
                    word_start_index: resume_word,
                    reason: e.to_string(),
                }
            })?;

        let mut chunks = WordChunker::new(&segment.words, chunk_size)
            .enumerate()
            .skip(resume)
            .peekable();

        while let Some((index, chunk)) = chunks.next() {
            if let Some(gauge) = &options.buffer_gauge {
                if gauge.is_over(options.max_buffer_size) {
                    session.set_state(RenderState::Backpressured);
                    debug!(
                        "render: segment {} paused at chunk {index} ({} samples buffered)",
                        segment.id,
                        gauge.buffered()
                    );
                    gauge.wait_until_at_most(options.max_buffer_size).await;
                }
            }

            let slot_end = chunks.peek().map_or(segment.end, |(_, next)| next.start());
            let slot = (cursor, (slot_end - cursor).max(0.0));
            let speech_start = chunk.start().max(cursor);
            let speech = (speech_start, (chunk.end().min(slot_end) - speech_start).max(0.0));
            let metadata = ChunkMetadata::for_words(&segment.id, chunk.start_index, chunk.end_index());

            let aligned = {
                // Scratch for this chunk only; released before the yield.
                let _staging = renderer.resources.acquire(
                    "render.staging",
                    renderer.aligner.samples_for(slot.1) * std::mem::size_of::<f32>(),
                );

                session.set_state(RenderState::Synthesizing);
                let text = chunk.text();
                let (context_before, context_after) = if render.preserve_prosody {
                    (chunk.context_before.as_str(), chunk.context_after.as_str())
                } else {
                    ("", "")
                };
                let request = SynthesisRequest {
                    text: &text,
                    context_before,
                    context_after,
                    model: &model,
                    speed: render.speed,
                };
                let raw = renderer.backend.synthesize(&request).await.map_err(|e| {
                    session.set_state(RenderState::Aborted);
                    synthesis_error(&segment.id, &render.voice, index, chunk.start_index, e)
                })?;

                session.set_state(RenderState::Aligning);
                let result = if render.use_word_timings {
                    renderer.aligner.align_in_slot(raw, speech, slot, metadata)
                } else {
                    renderer.aligner.place_natural(raw, cursor, metadata)
                };
                result.map_err(|source| {
                    session.set_state(RenderState::Aborted);
                    RenderError::Alignment {
                        segment_id: segment.id.clone(),
                        chunk_index: index,
                        word_start_index: chunk.start_index,
                        source,
                    }
                })?
            };

            cursor = if render.use_word_timings {
                slot_end
            } else {
                cursor + aligned.duration
            };
            processed += chunk.len();
            session.update(|s| {
                s.state = RenderState::Emitted;
                s.processed_words = processed;
                s.chunks_emitted += 1;
                s.cursor = cursor;
            });
            options.report_progress(processed as f64 / total_words as f64);
            if let Some(cb) = &options.on_chunk {
                cb(&aligned);
            }
            debug!(
                "render: segment {} chunk {index}/{chunk_count} words {}..={} at {:.3}s (+{:.3}s)",
                segment.id,
                chunk.start_index,
                chunk.end_index(),
                aligned.timestamp,
                aligned.duration
            );

            yield aligned;
        }

        session.set_state(RenderState::Done);
    }
}

/// Map a backend failure onto the render error taxonomy.
pub(crate) fn synthesis_error(
    segment_id: &str,
    voice: &str,
    chunk_index: usize,
    word_start_index: usize,
    err: SynthesisError,
) -> RenderError {
    match err {
        SynthesisError::ModelUnavailable(reason) => RenderError::ModelUnavailable {
            segment_id: segment_id.to_string(),
            voice: voice.to_string(),
            chunk_index,
            word_start_index,
            reason,
        },
        SynthesisError::Backend(reason) => RenderError::SynthesisFailure {
            segment_id: segment_id.to_string(),
            chunk_index,
            word_start_index,
            reason,
        },
    }
}
