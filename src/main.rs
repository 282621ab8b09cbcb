//! Demo entry point: renders subtitle segments with the tone voice.
//!
//! # Usage
//!
//! ```text
//! timed-tts [segments.json]
//! ```
//!
//! `segments.json` holds a JSON array of segments (`id`, `start`, `end`,
//! `text`, `words`).  Without it a built-in pair of segments is rendered.
//!
//! # Sequence
//!
//! 1. Initialise logging.
//! 2. Load [`RenderConfig`] from disk (defaults on first run).
//! 3. Create the tokio runtime.
//! 4. Build the model registry and the tone backend.
//! 5. Render every segment concurrently and mix the streams.
//! 6. Re-render one word in place.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use timed_tts::{
    config::RenderConfig,
    render::{AudioRenderer, StreamOptions},
    subtitle::{Segment, Word},
    synth::{
        ModelMetadata, ResourceTracker, SerializedBackend, StaticModelProvider, ToneSynthesizer,
    },
};

/// Native rate of the built-in tone voice.
const TONE_SAMPLE_RATE: u32 = 24_000;

fn demo_segments() -> Vec<Segment> {
    let words = |start: f64, texts: &[&str]| -> Vec<Word> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Word::new(*t, start + i as f64 * 0.4, 0.35))
            .collect()
    };
    vec![
        Segment::new("1", 0.0, 2.0, words(0.0, &["hello", "and", "welcome", "to", "the"])),
        Segment::new("2", 2.5, 4.5, words(2.5, &["timed", "speech", "renderer", "demo", "reel"])),
    ]
}

fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let segments: Vec<Segment> = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(segments)
}

async fn run(config: RenderConfig, segments: Vec<Segment>) -> Result<()> {
    let resources = ResourceTracker::new();
    let models = StaticModelProvider::new()
        .with_model(ModelMetadata::tts(config.voice.voice.clone(), TONE_SAMPLE_RATE));
    let backend = SerializedBackend::new(ToneSynthesizer::new(config.tone, resources.clone()));
    let renderer = AudioRenderer::new(Arc::new(models), Arc::new(backend), &config)
        .with_resources(resources.clone());

    let options = config.stream_options();
    let streams: Vec<_> = segments
        .iter()
        .map(|segment| {
            let id = segment.id.clone();
            let opts = options
                .clone()
                .with_progress(move |p| log::debug!("segment {id}: {:.0}%", p * 100.0));
            renderer.stream_segment(segment.clone(), config.voice.clone(), opts)
        })
        .collect();

    let mut mixed = Box::pin(renderer.stream_concatenate(streams, &options));
    let mut buffers = 0_usize;
    let mut samples = 0_usize;
    let mut peak = 0.0_f32;
    while let Some(buffer) = mixed.next().await {
        let buffer = buffer.context("render failed")?;
        buffers += 1;
        samples += buffer.len();
        peak = buffer.iter().fold(peak, |m, s| m.max(s.abs()));
    }
    log::info!(
        "Rendered {} segment(s): {buffers} buffer(s), {:.2}s of audio at {} Hz, peak {peak:.3}",
        segments.len(),
        samples as f64 / renderer.sample_rate() as f64,
        renderer.sample_rate()
    );

    if let Some(segment) = segments.iter().find(|s| !s.words.is_empty()) {
        let chunk = renderer
            .re_render_word(segment, 0, "greetings", &config.voice)
            .await
            .context("re-render failed")?;
        log::info!(
            "Re-rendered '{}' as 'greetings': {} samples at {:.3}s (+{:.3}s)",
            segment.words[0].text,
            chunk.len(),
            chunk.timestamp,
            chunk.duration
        );
    }

    log::info!(
        "Compute leases: {} acquired, {} released",
        resources.acquired(),
        resources.released()
    );
    Ok(())
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("timed-tts starting up");

    // 2. Configuration
    let config = RenderConfig::load()
        .unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            RenderConfig::default()
        })
        .sanitized();

    let segments = match std::env::args_os().nth(1) {
        Some(path) => load_segments(Path::new(&path))?,
        None => demo_segments(),
    };

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4-6. Render
    rt.block_on(run(config, segments))
}
