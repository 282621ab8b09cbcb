//! Procedural tone voice.
//!
//! [`ToneSynthesizer`] is a deterministic stand-in for a neural voice: a sine
//! at `base_frequency × pitch` with a linear attack/release envelope, lasting
//! `seconds_per_char` per character of text divided by the speed.  It runs
//! at the model's native rate and allocates its scratch space through
//! [`ComputeLease`]s, one per buffer, scoped to the call.
//!
//! [`ComputeLease`]: super::ComputeLease

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{SynthesisBackend, SynthesisError, SynthesisRequest, SynthesizedAudio};
use super::lease::ResourceTracker;

/// Fraction of the clip spent fading in, and again fading out.
const ENVELOPE_FRACTION: f32 = 0.1;
/// Size of the packed parameter block (8 × f32).
const PARAMS_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// ToneConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Carrier frequency in Hz before the pitch factor.
    pub base_frequency: f32,
    /// Multiplier on `base_frequency`.
    pub pitch: f32,
    /// Seconds of audio per character at speed 1.0.
    pub seconds_per_char: f32,
    /// Peak amplitude.
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            base_frequency: 440.0,
            pitch: 1.0,
            seconds_per_char: 0.1,
            amplitude: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// ToneSynthesizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    config: ToneConfig,
    resources: ResourceTracker,
}

impl ToneSynthesizer {
    pub fn new(config: ToneConfig, resources: ResourceTracker) -> Self {
        Self { config, resources }
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    /// Output length for `text` at `sample_rate` and `speed`.
    pub fn output_len(&self, text: &str, sample_rate: u32, speed: f32) -> usize {
        let chars = text.chars().count() as f64;
        let speed = if speed > 0.0 { speed as f64 } else { 1.0 };
        (chars * self.config.seconds_per_char as f64 * sample_rate as f64 / speed).round() as usize
    }

    fn render(&self, len: usize, sample_rate: u32) -> Vec<f32> {
        let freq = self.config.base_frequency * self.config.pitch;
        let step = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let total = len as f32;

        (0..len)
            .map(|i| {
                let t = i as f32 / total;
                let gain = if t < ENVELOPE_FRACTION {
                    t / ENVELOPE_FRACTION
                } else if t > 1.0 - ENVELOPE_FRACTION {
                    (1.0 - t) / ENVELOPE_FRACTION
                } else {
                    1.0
                };
                (step * i as f64).sin() as f32 * gain * self.config.amplitude
            })
            .collect()
    }
}

#[async_trait]
impl SynthesisBackend for ToneSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let sample_rate = request.model.sample_rate();
        if sample_rate == 0 {
            return Err(SynthesisError::ModelUnavailable(format!(
                "model {} reports a 0 Hz sample rate",
                request.model.id()
            )));
        }

        let len = self.output_len(request.text, sample_rate, request.speed);
        let bytes = len * std::mem::size_of::<f32>();

        let _output = self.resources.acquire("tone.output", bytes);
        let _params = self.resources.acquire("tone.params", PARAMS_BYTES);
        let samples = self.render(len, sample_rate);

        // Readback is a separate step; a dropped future releases everything.
        let _staging = self.resources.acquire("tone.staging", bytes);
        tokio::task::yield_now().await;

        Ok(SynthesizedAudio {
            samples,
            sample_rate,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{ModelHandle, ModelMetadata};

    fn synth() -> ToneSynthesizer {
        ToneSynthesizer::new(ToneConfig::default(), ResourceTracker::new())
    }

    fn request<'a>(text: &'a str, model: &'a ModelHandle, speed: f32) -> SynthesisRequest<'a> {
        SynthesisRequest {
            text,
            context_before: "",
            context_after: "",
            model,
            speed,
        }
    }

    #[tokio::test]
    async fn length_follows_text_and_speed() {
        let model = ModelHandle::new(ModelMetadata::tts("tone", 8_000));
        let tone = synth();
        let normal = tone.synthesize(&request("hello", &model, 1.0)).await.unwrap();
        let fast = tone.synthesize(&request("hello", &model, 2.0)).await.unwrap();
        assert_eq!(normal.samples.len(), 4_000);
        assert_eq!(fast.samples.len(), 2_000);
        assert_eq!(normal.sample_rate, 8_000);
    }

    #[tokio::test]
    async fn envelope_starts_and_ends_quiet() {
        let model = ModelHandle::new(ModelMetadata::tts("tone", 8_000));
        let out = synth().synthesize(&request("abcdefghij", &model, 1.0)).await.unwrap();
        let peak = out.samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
        assert!(peak <= 0.5 + 1e-6);
        assert!(peak > 0.4);
        assert!(out.samples[0].abs() < 1e-6);
        assert!(out.samples[out.samples.len() - 1].abs() < 0.01);
    }

    #[tokio::test]
    async fn leases_are_released_after_call() {
        let model = ModelHandle::new(ModelMetadata::tts("tone", 8_000));
        let tone = synth();
        tone.synthesize(&request("hi", &model, 1.0)).await.unwrap();
        assert_eq!(tone.resources().acquired(), 3);
        assert_eq!(tone.resources().outstanding(), 0);
    }

    #[tokio::test]
    async fn empty_text_is_silent() {
        let model = ModelHandle::new(ModelMetadata::tts("tone", 8_000));
        let out = synth().synthesize(&request("", &model, 1.0)).await.unwrap();
        assert!(out.samples.is_empty());
    }

    #[tokio::test]
    async fn zero_rate_model_rejected() {
        let model = ModelHandle::new(ModelMetadata::tts("broken", 0));
        let err = synth().synthesize(&request("hi", &model, 1.0)).await.unwrap_err();
        assert!(matches!(err, SynthesisError::ModelUnavailable(_)));
    }

    #[test]
    fn non_positive_speed_treated_as_normal() {
        let tone = synth();
        assert_eq!(tone.output_len("abcd", 1_000, 0.0), tone.output_len("abcd", 1_000, 1.0));
    }
}
