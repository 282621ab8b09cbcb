//! Timing aligner: fit synthesized speech into an authored time window.
//!
//! The aligner takes raw backend output at the backend's native rate, brings
//! it to the timeline rate and time-stretches it so that it lasts exactly
//! the requested duration.  Pitch is preserved (see [`super::stretch`]).

use log::trace;
use thiserror::Error;

use super::chunk::{AudioChunk, ChunkMetadata};
use super::resample::{convert_rate, ResampleError};
use super::stretch::{time_stretch, StretchParams};
use crate::subtitle::TIMING_TOLERANCE;
use crate::synth::SynthesizedAudio;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("invalid target window: start {start}s, duration {duration}s")]
    InvalidWindow { start: f64, duration: f64 },

    #[error("speech window [{speech_start:.3}s, +{speech_duration:.3}s) lies outside its slot")]
    SpeechOutsideSlot {
        speech_start: f64,
        speech_duration: f64,
    },

    #[error("sample-rate conversion failed: {0}")]
    Resample(#[from] ResampleError),
}

// ---------------------------------------------------------------------------
// TimingAligner
// ---------------------------------------------------------------------------

/// Re-times synthesized audio onto the subtitle timeline.
#[derive(Debug, Clone)]
pub struct TimingAligner {
    sample_rate: u32,
    stretch: StretchParams,
}

impl TimingAligner {
    pub fn new(sample_rate: u32, stretch: StretchParams) -> Self {
        Self {
            sample_rate,
            stretch,
        }
    }

    /// Timeline sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples covering `seconds` at the timeline rate.
    pub fn samples_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Absolute sample index of timeline time `seconds`.
    pub fn sample_at(&self, seconds: f64) -> i64 {
        (seconds * self.sample_rate as f64).round() as i64
    }

    /// Align `raw` to `[target_start, target_start + target_duration)`.
    ///
    /// The returned chunk has exactly `round(target_duration * sample_rate)`
    /// samples, `timestamp == target_start` and
    /// `duration == target_duration`.
    pub fn align(
        &self,
        raw: SynthesizedAudio,
        target_start: f64,
        target_duration: f64,
        metadata: ChunkMetadata,
    ) -> Result<AudioChunk, AlignError> {
        check_window(target_start, target_duration)?;
        let samples = self.fit(raw, target_duration)?;
        Ok(AudioChunk {
            samples,
            timestamp: target_start,
            duration: target_duration,
            metadata,
        })
    }

    /// Align speech to `speech` and pad it with silence to fill `slot`.
    ///
    /// Both windows are `(start, duration)`.  The speech window must lie
    /// inside the slot (within [`TIMING_TOLERANCE`]).  The chunk spans the
    /// whole slot, `round(end * rate) - round(start * rate)` samples; speech
    /// that would overrun it after rounding is clipped.
    pub fn align_in_slot(
        &self,
        raw: SynthesizedAudio,
        speech: (f64, f64),
        slot: (f64, f64),
        metadata: ChunkMetadata,
    ) -> Result<AudioChunk, AlignError> {
        let (speech_start, speech_duration) = speech;
        let (slot_start, slot_duration) = slot;
        check_window(speech_start, speech_duration)?;
        check_window(slot_start, slot_duration)?;

        if speech_start < slot_start - TIMING_TOLERANCE
            || speech_start + speech_duration > slot_start + slot_duration + TIMING_TOLERANCE
        {
            return Err(AlignError::SpeechOutsideSlot {
                speech_start,
                speech_duration,
            });
        }

        // Counts come from rounded absolute positions so adjacent slots
        // abut without a gap or a shared sample.
        let slot_first = self.sample_at(slot_start);
        let total = (self.sample_at(slot_start + slot_duration) - slot_first).max(0) as usize;
        let lead = ((self.sample_at(speech_start) - slot_first).max(0) as usize).min(total);
        let speech = self.fit(raw, speech_duration)?;

        let mut samples = vec![0.0_f32; total];
        let n = speech.len().min(total - lead);
        samples[lead..lead + n].copy_from_slice(&speech[..n]);

        Ok(AudioChunk {
            samples,
            timestamp: slot_start,
            duration: slot_duration,
            metadata,
        })
    }

    /// Keep the natural length, only converting to the timeline rate.
    pub fn place_natural(
        &self,
        raw: SynthesizedAudio,
        start: f64,
        metadata: ChunkMetadata,
    ) -> Result<AudioChunk, AlignError> {
        let samples = convert_rate(&raw.samples, raw.sample_rate, self.sample_rate)?;
        let duration = samples.len() as f64 / self.sample_rate as f64;
        Ok(AudioChunk {
            samples,
            timestamp: start,
            duration,
            metadata,
        })
    }

    fn fit(&self, raw: SynthesizedAudio, target_duration: f64) -> Result<Vec<f32>, AlignError> {
        let native = convert_rate(&raw.samples, raw.sample_rate, self.sample_rate)?;
        let target_len = self.samples_for(target_duration);

        if !native.is_empty() {
            let natural = native.len() as f64 / self.sample_rate as f64;
            trace!(
                "align: {:.3}s -> {:.3}s (scale {:.3})",
                natural,
                target_duration,
                target_duration / natural
            );
        }

        Ok(time_stretch(&native, target_len, self.sample_rate, &self.stretch))
    }
}

fn check_window(start: f64, duration: f64) -> Result<(), AlignError> {
    if !start.is_finite() || !duration.is_finite() || duration < 0.0 {
        return Err(AlignError::InvalidWindow { start, duration });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn aligner() -> TimingAligner {
        TimingAligner::new(16_000, StretchParams::default())
    }

    fn tone(len: usize, rate: u32) -> SynthesizedAudio {
        SynthesizedAudio {
            samples: (0..len)
                .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / rate as f32).sin() * 0.3)
                .collect(),
            sample_rate: rate,
        }
    }

    #[test]
    fn align_hits_exact_duration() {
        let chunk = aligner()
            .align(tone(4_000, 16_000), 2.0, 0.75, ChunkMetadata::for_words("s", 0, 3))
            .unwrap();
        assert_eq!(chunk.len(), 12_000);
        assert_eq!(chunk.timestamp, 2.0);
        assert_eq!(chunk.duration, 0.75);
        assert_eq!(chunk.metadata.word_end_index, 3);
    }

    #[test]
    fn align_converts_backend_rate() {
        // 0.5 s at 24 kHz, placed into 0.5 s at 16 kHz.
        let chunk = aligner()
            .align(tone(12_000, 24_000), 0.0, 0.5, ChunkMetadata::default())
            .unwrap();
        assert_eq!(chunk.len(), 8_000);
    }

    #[test]
    fn align_zero_duration_is_empty() {
        let chunk = aligner()
            .align(tone(1_000, 16_000), 1.0, 0.0, ChunkMetadata::default())
            .unwrap();
        assert!(chunk.is_empty());
        assert_eq!(chunk.duration, 0.0);
    }

    #[test]
    fn align_silent_backend_gives_silence() {
        let raw = SynthesizedAudio {
            samples: Vec::new(),
            sample_rate: 16_000,
        };
        let chunk = aligner().align(raw, 0.0, 0.1, ChunkMetadata::default()).unwrap();
        assert_eq!(chunk.samples, vec![0.0; 1_600]);
    }

    #[test]
    fn negative_duration_rejected() {
        let err = aligner()
            .align(tone(10, 16_000), 0.0, -1.0, ChunkMetadata::default())
            .unwrap_err();
        assert!(matches!(err, AlignError::InvalidWindow { .. }));
    }

    #[test]
    fn slot_pads_leading_and_trailing_silence() {
        let chunk = aligner()
            .align_in_slot(
                tone(8_000, 16_000),
                (1.25, 0.5),
                (1.0, 1.0),
                ChunkMetadata::default(),
            )
            .unwrap();
        assert_eq!(chunk.len(), 16_000);
        assert_eq!(chunk.timestamp, 1.0);
        assert_eq!(chunk.duration, 1.0);
        assert!(chunk.samples[..4_000].iter().all(|&s| s == 0.0));
        assert!(chunk.samples[12_000..].iter().all(|&s| s == 0.0));
        assert!(chunk.samples[4_000..12_000].iter().any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn adjacent_slots_tile_sample_exactly() {
        let aligner = TimingAligner::new(1_000, StretchParams::default());
        let bounds = [0.0, 0.3333, 0.6667, 1.0];
        let mut total = 0;
        for pair in bounds.windows(2) {
            let chunk = aligner
                .align_in_slot(
                    tone(100, 1_000),
                    (pair[0], pair[1] - pair[0]),
                    (pair[0], pair[1] - pair[0]),
                    ChunkMetadata::default(),
                )
                .unwrap();
            assert_eq!(chunk.len() as i64, aligner.sample_at(pair[1]) - aligner.sample_at(pair[0]));
            total += chunk.len();
        }
        assert_eq!(total, 1_000);
    }

    #[test]
    fn speech_outside_slot_rejected() {
        let err = aligner()
            .align_in_slot(
                tone(100, 16_000),
                (0.5, 1.0),
                (0.0, 1.0),
                ChunkMetadata::default(),
            )
            .unwrap_err();
        assert!(matches!(err, AlignError::SpeechOutsideSlot { .. }));
    }

    #[test]
    fn natural_placement_keeps_length() {
        let chunk = aligner()
            .place_natural(tone(8_000, 16_000), 3.0, ChunkMetadata::default())
            .unwrap();
        assert_eq!(chunk.len(), 8_000);
        assert!((chunk.duration - 0.5).abs() < 1e-12);
        assert_eq!(chunk.timestamp, 3.0);
    }
}
