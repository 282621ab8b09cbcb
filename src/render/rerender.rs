//! In-place re-render of a single word.
//!
//! The replacement is synthesized with the same two-word context the word
//! had in the segment and is then stretched into the word's **original**
//! slot, so nothing else on the timeline moves.

use log::debug;

use super::chunker::context_around;
use super::error::RenderError;
use super::renderer::AudioRenderer;
use super::streamer::synthesis_error;
use crate::audio::{AudioChunk, ChunkMetadata};
use crate::subtitle::{RenderOptions, Segment};
use crate::synth::SynthesisRequest;

pub(crate) async fn re_render_word(
    renderer: &AudioRenderer,
    segment: &Segment,
    word_index: usize,
    new_text: &str,
    render: &RenderOptions,
) -> Result<AudioChunk, RenderError> {
    let word = segment
        .words
        .get(word_index)
        .ok_or_else(|| RenderError::WordIndexOutOfRange {
            segment_id: segment.id.clone(),
            index: word_index,
            len: segment.words.len(),
        })?;

    let model = renderer
        .models
        .get_model(&render.voice)
        .await
        .map_err(|e| RenderError::ModelUnavailable {
            segment_id: segment.id.clone(),
            voice: render.voice.clone(),
            chunk_index: word_index,
            word_start_index: word_index,
            reason: e.to_string(),
        })?;

    let (context_before, context_after) = if render.preserve_prosody {
        context_around(&segment.words, word_index, word_index + 1)
    } else {
        (String::new(), String::new())
    };

    let _staging = renderer.resources.acquire(
        "render.staging",
        renderer.aligner.samples_for(word.duration) * std::mem::size_of::<f32>(),
    );

    let request = SynthesisRequest {
        text: new_text,
        context_before: &context_before,
        context_after: &context_after,
        model: &model,
        speed: render.speed,
    };
    let raw = renderer
        .backend
        .synthesize(&request)
        .await
        .map_err(|e| synthesis_error(&segment.id, &render.voice, word_index, word_index, e))?;

    debug!(
        "render: re-rendered word {word_index} of segment {} ('{}' -> '{}')",
        segment.id, word.text, new_text
    );

    renderer
        .aligner
        .align(
            raw,
            word.start,
            word.duration,
            ChunkMetadata::for_words(&segment.id, word_index, word_index),
        )
        .map_err(|source| RenderError::Alignment {
            segment_id: segment.id.clone(),
            chunk_index: word_index,
            word_start_index: word_index,
            source,
        })
}
