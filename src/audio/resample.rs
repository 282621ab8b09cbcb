//! Length and sample-rate conversion for mono `f32` audio.
//!
//! Two tools with different jobs:
//!
//! 1. [`resample_linear`]: squeeze or stretch a buffer to an exact sample
//!    count by linear interpolation.  Pitch follows the speed change, so it
//!    is only used where a clip is too short for the time-stretcher.
//! 2. [`convert_rate`]: band-limited sample-rate conversion with `rubato`
//!    (`SincFixedIn` + `BlackmanHarris2` window) for backends whose native
//!    rate differs from the render rate.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

/// Frames fed to the sinc resampler per call.
const RATE_CHUNK: usize = 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("invalid sample rate: {0} Hz")]
    InvalidRate(u32),

    #[error("resampler setup failed: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample `samples` to exactly `output_len` samples using linear
/// interpolation.
///
/// * `output_len == 0` returns an empty vector.
/// * An empty input returns `output_len` zeros.
/// * Equal lengths return a copy.
///
/// # Example
///
/// ```rust
/// use timed_tts::audio::resample_linear;
///
/// let out = resample_linear(&[0.0, 1.0], 3);
/// assert_eq!(out, vec![0.0, 0.5, 1.0]);
/// ```
pub fn resample_linear(samples: &[f32], output_len: usize) -> Vec<f32> {
    if output_len == 0 {
        return Vec::new();
    }
    if samples.is_empty() {
        return vec![0.0; output_len];
    }
    if samples.len() == output_len {
        return samples.to_vec();
    }
    if output_len == 1 || samples.len() == 1 {
        return vec![samples[0]; output_len];
    }

    // Map endpoints onto endpoints so first and last samples survive.
    let step = (samples.len() - 1) as f64 / (output_len - 1) as f64;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 * step;
            let idx = (src_pos as usize).min(last);
            let frac = (src_pos - idx as f64) as f32;
            if idx < last {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[last]
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// convert_rate
// ---------------------------------------------------------------------------

/// Convert `samples` from `from_rate` Hz to `to_rate` Hz.
///
/// The output has `round(len * to_rate / from_rate)` samples, with the
/// resampler's group delay removed so the audio stays aligned with its
/// timestamp.  Identical rates and empty input are returned unchanged.
pub fn convert_rate(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if from_rate == 0 {
        return Err(ResampleError::InvalidRate(from_rate));
    }
    if to_rate == 0 {
        return Err(ResampleError::InvalidRate(to_rate));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RATE_CHUNK, 1)?;
    let delay = resampler.output_delay();

    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);
    let mut pos = 0;

    while samples.len() - pos >= resampler.input_frames_next() {
        let n = resampler.input_frames_next();
        let block: [&[f32]; 1] = [&samples[pos..pos + n]];
        let out = resampler.process(&block[..], None)?;
        output.extend_from_slice(&out[0]);
        pos += n;
    }

    if pos < samples.len() {
        let tail: [&[f32]; 1] = [&samples[pos..]];
        let out = resampler.process_partial(Some(&tail[..]), None)?;
        output.extend_from_slice(&out[0]);
    }

    // Push silence through until the delayed tail has come out.
    while output.len() < expected + delay {
        let out = resampler.process_partial(None::<&[&[f32]]>, None)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
