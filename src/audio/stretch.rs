//! Pitch-preserving time-stretch (WSOLA).
//!
//! Waveform-similarity overlap-add: the output is built from Hann-windowed
//! frames taken from the input at a scaled hop.  Each frame's exact input
//! position is nudged within a small tolerance so that it lines up with the
//! natural continuation of the previous frame, which keeps the waveform
//! periodicity (and therefore the pitch) intact.
//!
//! Clips shorter than two analysis frames carry no usable periodicity and are
//! resampled linearly instead.

use serde::{Deserialize, Serialize};

use super::resample::resample_linear;

/// Normalisation floor for the overlap-added window sum.
const NORM_FLOOR: f32 = 1e-3;

// ---------------------------------------------------------------------------
// StretchParams
// ---------------------------------------------------------------------------

/// Tuning for [`time_stretch`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchParams {
    /// Analysis frame length in milliseconds.
    pub frame_ms: f32,
    /// Maximum shift (either way) when searching for the best-matching frame.
    pub search_ms: f32,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            frame_ms: 20.0,
            search_ms: 5.0,
        }
    }
}

impl StretchParams {
    /// Frame length in samples, even and at least 4.
    pub fn frame_len(&self, sample_rate: u32) -> usize {
        let len = (self.frame_ms.max(0.0) as f64 / 1000.0 * sample_rate as f64).round() as usize;
        (len & !1).max(4)
    }

    /// Search tolerance in samples.
    pub fn tolerance(&self, sample_rate: u32) -> usize {
        (self.search_ms.max(0.0) as f64 / 1000.0 * sample_rate as f64).round() as usize
    }
}

// ---------------------------------------------------------------------------
// time_stretch
// ---------------------------------------------------------------------------

/// Stretch or compress `input` to exactly `output_len` samples without
/// changing its pitch.
///
/// * `output_len == 0` returns an empty vector.
/// * An empty input returns `output_len` zeros.
/// * Equal lengths return a copy.
pub fn time_stretch(
    input: &[f32],
    output_len: usize,
    sample_rate: u32,
    params: &StretchParams,
) -> Vec<f32> {
    if output_len == 0 {
        return Vec::new();
    }
    if input.is_empty() {
        return vec![0.0; output_len];
    }
    if input.len() == output_len {
        return input.to_vec();
    }

    let frame = params.frame_len(sample_rate);
    if input.len() < 2 * frame || output_len < 2 * frame {
        return resample_linear(input, output_len);
    }

    let hop_out = frame / 2;
    let hop_in = hop_out as f64 * input.len() as f64 / output_len as f64;
    let tolerance = params.tolerance(sample_rate);
    let max_start = input.len() - frame;
    let window = hann(frame);

    let mut out = vec![0.0_f32; output_len + frame];
    let mut norm = vec![0.0_f32; output_len + frame];
    let mut prev_pos = 0_usize;

    let mut k = 0_usize;
    loop {
        let out_pos = k * hop_out;
        if out_pos >= output_len {
            break;
        }

        let nominal = ((k as f64 * hop_in).round() as usize).min(max_start);
        let pos = if k == 0 {
            0
        } else {
            let natural = (prev_pos + hop_out).min(max_start);
            best_match(input, nominal, natural, tolerance, hop_out, max_start)
        };

        let src = &input[pos..pos + frame];
        for i in 0..frame {
            out[out_pos + i] += src[i] * window[i];
            norm[out_pos + i] += window[i];
        }

        prev_pos = pos;
        k += 1;
    }

    for (s, &n) in out.iter_mut().zip(&norm) {
        if n > NORM_FLOOR {
            *s /= n;
        }
    }
    out.truncate(output_len);
    out
}

/// Periodic Hann window; two copies at 50 % overlap sum to one.
fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / len as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Input offset within `nominal ± tolerance` whose next `span` samples best
/// match the samples at `natural`.  Ties keep the nominal position.
fn best_match(
    input: &[f32],
    nominal: usize,
    natural: usize,
    tolerance: usize,
    span: usize,
    max_start: usize,
) -> usize {
    let reference = &input[natural..natural + span];
    let lo = nominal.saturating_sub(tolerance);
    let hi = (nominal + tolerance).min(max_start);

    let mut best = nominal;
    let mut best_score = similarity(reference, &input[nominal..nominal + span]);
    for cand in lo..=hi {
        let score = similarity(reference, &input[cand..cand + span]);
        if score > best_score {
            best_score = score;
            best = cand;
        }
    }
    best
}

/// Cross-correlation normalised by the candidate's energy.
fn similarity(reference: &[f32], candidate: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut energy = 0.0_f64;
    for (&r, &c) in reference.iter().zip(candidate) {
        dot += r as f64 * c as f64;
        energy += c as f64 * c as f64;
    }
    if energy <= f64::EPSILON {
        0.0
    } else {
        dot / energy.sqrt()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
