//! Renderer settings, defaults and TOML persistence.
//!
//! Every section implements `Serialize`, `Deserialize` and `Default`, and
//! missing sections fall back to their defaults, so a hand-written
//! `render.toml` only needs the values it changes.

use std::time::Duration;

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use super::RenderPaths;
use crate::audio::StretchParams;
use crate::merge::MergeOptions;
use crate::render::{StreamOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BUFFER_SIZE};
use crate::subtitle::RenderOptions;
use crate::synth::ToneConfig;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Timeline audio format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of every emitted chunk and merged buffer, in Hz.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Chunking, backpressure and merge pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum words per synthesis call.
    pub chunk_size: usize,
    /// Consumer buffer ceiling and merged buffer capacity, in samples.
    pub max_buffer_size: usize,
    /// Fill fraction (0, 1] at which the merge window flushes early.
    pub flush_threshold: f32,
    /// Pause between merge polling rounds.
    pub round_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            flush_threshold: 0.8,
            round_interval_ms: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// RenderConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level renderer configuration, serialised as `render.toml`.
///
/// ```rust,no_run
/// use timed_tts::config::RenderConfig;
///
/// // Defaults when the file does not exist yet.
/// let config = RenderConfig::load().unwrap().sanitized();
/// assert!(config.stream.chunk_size > 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub audio: AudioConfig,
    pub stream: StreamConfig,
    /// Time-stretch frame and search sizes.
    pub stretch: StretchParams,
    /// Voice settings used when the caller supplies none.
    pub voice: RenderOptions,
    /// Parameters of the built-in tone voice.
    pub tone: ToneConfig,
}

impl RenderConfig {
    /// Load from the platform `render.toml`; defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&RenderPaths::new().config_file)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the platform `render.toml`, creating parent directories.
    pub fn save(&self) -> Result<()> {
        self.save_to(&RenderPaths::new().config_file)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp out-of-range values, logging each correction.
    pub fn sanitized(mut self) -> Self {
        if self.audio.sample_rate == 0 {
            warn!("config: sample_rate 0 is invalid, using 48000");
            self.audio.sample_rate = AudioConfig::default().sample_rate;
        }
        if self.stream.chunk_size == 0 {
            warn!("config: chunk_size 0 is invalid, using 1");
            self.stream.chunk_size = 1;
        }
        if self.stream.max_buffer_size == 0 {
            warn!("config: max_buffer_size 0 is invalid, using 1");
            self.stream.max_buffer_size = 1;
        }
        let threshold = self.stream.flush_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            warn!("config: flush_threshold {threshold} outside (0, 1], using 1.0");
            self.stream.flush_threshold = 1.0;
        }
        if !(self.stretch.frame_ms > 0.0) || !(self.stretch.search_ms >= 0.0) {
            warn!(
                "config: stretch frame {}ms / search {}ms invalid, using defaults",
                self.stretch.frame_ms, self.stretch.search_ms
            );
            self.stretch = StretchParams::default();
        }
        if !(self.voice.speed > 0.0) {
            warn!("config: voice speed {} is invalid, using 1.0", self.voice.speed);
            self.voice.speed = 1.0;
        }
        self
    }

    /// Merge settings for buffers that start at timeline time `origin`.
    pub fn merge_options(&self, origin: f64) -> MergeOptions {
        MergeOptions {
            capacity: self.stream.max_buffer_size,
            sample_rate: self.audio.sample_rate,
            flush_threshold: self.stream.flush_threshold,
            round_interval: Duration::from_millis(self.stream.round_interval_ms),
            origin,
        }
    }

    /// Stream options without callbacks or a gauge.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            chunk_size: self.stream.chunk_size,
            max_buffer_size: self.stream.max_buffer_size,
            ..StreamOptions::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("render.toml");

        let mut original = RenderConfig::default();
        original.audio.sample_rate = 24_000;
        original.stream.chunk_size = 12;
        original.voice.voice = "narrator".into();
        original.tone.pitch = 1.5;
        original.save_to(&path).expect("save");

        let loaded = RenderConfig::load_from(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = RenderConfig::load_from(&path).expect("should not error");
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.stream.chunk_size, 50);
        assert_eq!(config.stream.max_buffer_size, 480_000);
        assert_eq!(config.audio.sample_rate, 48_000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("render.toml");
        std::fs::write(&path, "[stream]\nchunk_size = 8\n\n[voice]\nvoice = \"alto\"\n")
            .expect("write");

        let config = RenderConfig::load_from(&path).expect("load");
        assert_eq!(config.stream.chunk_size, 8);
        assert_eq!(config.stream.max_buffer_size, 480_000);
        assert_eq!(config.voice.voice, "alto");
        assert!(config.voice.preserve_prosody);
        assert_eq!(config.stretch, StretchParams::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("render.toml");
        std::fs::write(&path, "[stream\nchunk_size = ").expect("write");
        assert!(RenderConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("render.toml");
        RenderConfig::default().save_to(&path).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let mut config = RenderConfig::default();
        config.audio.sample_rate = 0;
        config.stream.chunk_size = 0;
        config.stream.max_buffer_size = 0;
        config.stream.flush_threshold = 1.5;
        config.stretch.frame_ms = 0.0;
        config.voice.speed = -2.0;

        let config = config.sanitized();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.stream.chunk_size, 1);
        assert_eq!(config.stream.max_buffer_size, 1);
        assert_eq!(config.stream.flush_threshold, 1.0);
        assert_eq!(config.stretch, StretchParams::default());
        assert_eq!(config.voice.speed, 1.0);
    }

    #[test]
    fn sanitized_keeps_valid_values() {
        let config = RenderConfig::default();
        assert_eq!(config.clone().sanitized(), config);
    }

    #[test]
    fn merge_options_follow_stream_section() {
        let mut config = RenderConfig::default();
        config.stream.max_buffer_size = 4_096;
        config.stream.round_interval_ms = 0;
        let merge = config.merge_options(2.5);
        assert_eq!(merge.capacity, 4_096);
        assert_eq!(merge.sample_rate, 48_000);
        assert!(merge.round_interval.is_zero());
        assert_eq!(merge.origin, 2.5);

        let stream = config.stream_options();
        assert_eq!(stream.max_buffer_size, 4_096);
        assert_eq!(stream.chunk_size, 50);
        assert!(stream.on_progress.is_none());
    }
}
