//! Synchronous merge state: pending chunks plus one accumulation window.
//!
//! Positions are integer sample indices from the timeline origin, so two
//! chunks that meet in time also meet sample-exactly in the output.  The
//! window covers `[window_start, window_start + capacity)`; a chunk that
//! runs past it is split, the head mixed now and the tail re-queued at the
//! next window start until the window has been flushed.
//!
//! Flushing is driven by a watermark, the earliest sample any producer can
//! still deliver.  Everything before it is final:
//!
//! * a window that ends at or before the watermark is emitted whole;
//! * otherwise, once the final part reaches the flush threshold, that prefix
//!   is emitted and the window slides forward by its length.
//!
//! Emitted buffers are at most `capacity` long and concatenate to the
//! gapless timeline from the origin.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use log::{debug, warn};

use crate::audio::{AudioChunk, MixBuffer};

// ---------------------------------------------------------------------------
// MergeOptions
// ---------------------------------------------------------------------------

/// Parameters for one merge run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Samples per emitted buffer.
    pub capacity: usize,
    pub sample_rate: u32,
    /// Fill fraction at which a window is flushed early.
    pub flush_threshold: f32,
    /// Pause between polling rounds; zero only yields to the scheduler.
    pub round_interval: Duration,
    /// Timeline time (seconds) of output sample 0.
    pub origin: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            capacity: 480_000,
            sample_rate: 48_000,
            flush_threshold: 0.8,
            round_interval: Duration::from_millis(10),
            origin: 0.0,
        }
    }
}

impl MergeOptions {
    /// Clamp out-of-range values, logging each correction.
    pub fn sanitized(mut self) -> Self {
        if self.capacity == 0 {
            warn!("merge: capacity 0 is invalid, using 1");
            self.capacity = 1;
        }
        if self.sample_rate == 0 {
            warn!("merge: sample rate 0 is invalid, using 48000");
            self.sample_rate = 48_000;
        }
        if !(self.flush_threshold > 0.0 && self.flush_threshold <= 1.0) {
            warn!(
                "merge: flush threshold {} outside (0, 1], using 1.0",
                self.flush_threshold
            );
            self.flush_threshold = 1.0;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Pending queue entry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pending {
    start: i64,
    seq: u64,
    samples: Vec<f32>,
}

// Min-heap on (start, seq).
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.start, other.seq).cmp(&(self.start, self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.seq == other.seq
    }
}

impl Eq for Pending {}

// ---------------------------------------------------------------------------
// MergeWindow
// ---------------------------------------------------------------------------

/// Time-ordered pending chunks and the current output window.
#[derive(Debug)]
pub struct MergeWindow {
    buffer: MixBuffer,
    pending: BinaryHeap<Pending>,
    sample_rate: u32,
    origin: f64,
    flush_threshold: f32,
    window_start: i64,
    next_seq: u64,
    dropped_samples: u64,
}

impl MergeWindow {
    pub fn new(options: &MergeOptions) -> Self {
        let options = options.clone().sanitized();
        Self {
            buffer: MixBuffer::new(options.capacity),
            pending: BinaryHeap::new(),
            sample_rate: options.sample_rate,
            origin: options.origin,
            flush_threshold: options.flush_threshold,
            window_start: 0,
            next_seq: 0,
            dropped_samples: 0,
        }
    }

    /// Sample index of timeline time `timestamp`.
    pub fn sample_index(&self, timestamp: f64) -> i64 {
        ((timestamp - self.origin) * self.sample_rate as f64).round() as i64
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// First sample index of the current window.
    pub fn window_start_sample(&self) -> i64 {
        self.window_start
    }

    /// One past the last sample index of the current window.
    pub fn window_end_sample(&self) -> i64 {
        self.window_start + self.buffer.capacity() as i64
    }

    /// Samples discarded because they arrived for an already-flushed window.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }

    /// Returns `true` when nothing has been mixed into the current window.
    pub fn is_window_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue a chunk for mixing.
    pub fn push(&mut self, chunk: AudioChunk) {
        let start = self.sample_index(chunk.timestamp);
        self.enqueue(start, chunk.samples);
    }

    fn enqueue(&mut self, start: i64, samples: Vec<f32>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            start,
            seq,
            samples,
        });
    }

    /// Emit everything that lies before `watermark`.
    ///
    /// `watermark` is the earliest sample index any producer can still
    /// deliver; it must be a real position on the timeline.
    pub fn release(&mut self, watermark: i64) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        self.mix_pending();
        while watermark >= self.window_end_sample() {
            out.push(self.flush());
            self.mix_pending();
        }

        let settled = (watermark - self.window_start).max(0) as usize;
        if settled > 0 && settled as f32 >= self.flush_threshold * self.capacity() as f32 {
            out.push(self.flush_prefix(settled));
            self.mix_pending();
        }
        out
    }

    /// Drain everything: full windows (silent across gaps), then the filled
    /// part of the last window if any.
    pub fn finish(&mut self) -> Vec<Vec<f32>> {
        let mut out = Vec::new();
        loop {
            self.mix_pending();
            if self.pending.is_empty() {
                break;
            }
            out.push(self.flush());
        }
        if !self.buffer.is_empty() {
            out.push(self.buffer.take_filled());
        }
        out
    }

    /// Mix every pending chunk that starts inside the window.  Tails that
    /// overflow it stay queued at the next window start.
    fn mix_pending(&mut self) {
        while self
            .pending
            .peek()
            .is_some_and(|p| p.start < self.window_end_sample())
        {
            let Some(item) = self.pending.pop() else {
                break;
            };
            self.mix(item);
        }
    }

    fn mix(&mut self, item: Pending) {
        let Pending {
            mut start,
            mut samples,
            ..
        } = item;

        if start < self.window_start {
            let late = (self.window_start - start) as usize;
            let cut = late.min(samples.len());
            if cut > 0 {
                self.dropped_samples += cut as u64;
                warn!(
                    "merge: clipped {cut} late samples before window start {}",
                    self.window_start
                );
            }
            samples.drain(..cut);
            start = self.window_start;
            if samples.is_empty() {
                return;
            }
        }

        let offset = (start - self.window_start) as usize;
        let consumed = self.buffer.mix_at(offset, &samples);
        if consumed < samples.len() {
            let tail = samples.split_off(consumed);
            let next_start = self.window_end_sample();
            self.enqueue(next_start, tail);
        }
    }

    /// Emit the whole window, trailing silence included.
    fn flush(&mut self) -> Vec<f32> {
        let out = self.buffer.take_full();
        debug!(
            "merge: flushed window at sample {} ({} pending)",
            self.window_start,
            self.pending.len()
        );
        self.window_start += self.buffer.capacity() as i64;
        out
    }

    /// Emit the first `len` samples and slide the window forward by `len`.
    fn flush_prefix(&mut self, len: usize) -> Vec<f32> {
        let out = self.buffer.take_prefix(len);
        debug!(
            "merge: flushed {} settled samples at sample {}",
            out.len(),
            self.window_start
        );
        self.window_start += out.len() as i64;
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ChunkMetadata;

    fn options(capacity: usize) -> MergeOptions {
        MergeOptions {
            capacity,
            sample_rate: 1_000,
            flush_threshold: 1.0,
            round_interval: Duration::ZERO,
            origin: 0.0,
        }
    }

    fn chunk(timestamp: f64, len: usize, value: f32) -> AudioChunk {
        AudioChunk {
            samples: vec![value; len],
            timestamp,
            duration: len as f64 / 1_000.0,
            metadata: ChunkMetadata::default(),
        }
    }

    fn concat(buffers: Vec<Vec<f32>>) -> Vec<f32> {
        buffers.into_iter().flatten().collect()
    }

    // ---- placement ---------------------------------------------------------

    #[test]
    fn adjacent_chunks_meet_exactly() {
        let mut w = MergeWindow::new(&options(10_000));
        w.push(chunk(0.0, 1_000, 0.25));
        w.push(chunk(1.0, 1_000, 0.5));
        assert!(w.release(0).is_empty());
        let out = concat(w.finish());
        assert_eq!(out.len(), 2_000);
        assert!(out[..1_000].iter().all(|&s| s == 0.25));
        assert!(out[1_000..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn overlapping_chunks_add() {
        let mut w = MergeWindow::new(&options(10_000));
        w.push(chunk(0.0, 1_000, 0.25));
        w.push(chunk(0.0, 1_000, 0.5));
        let out = concat(w.finish());
        assert_eq!(out.len(), 1_000);
        assert!(out.iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let mut w = MergeWindow::new(&options(10_000));
        w.push(chunk(1.0, 500, 0.5));
        w.push(chunk(0.0, 500, 0.25));
        let out = concat(w.finish());
        assert_eq!(out.len(), 1_500);
        assert_eq!(out[0], 0.25);
        assert_eq!(out[499], 0.25);
        assert_eq!(out[500], 0.0);
        assert_eq!(out[1_000], 0.5);
    }

    // ---- overflow ----------------------------------------------------------

    #[test]
    fn overflow_splits_chunk_across_windows() {
        let mut w = MergeWindow::new(&options(300));
        w.push(chunk(0.0, 1_000, 0.1));
        let flushed = w.release(1_000);
        assert_eq!(flushed.len(), 3);
        assert!(flushed.iter().all(|b| b.len() == 300));
        let tail = w.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].len(), 100);
        assert_eq!(w.dropped_samples(), 0);
    }

    #[test]
    fn overflowing_window_waits_for_watermark() {
        let mut w = MergeWindow::new(&options(100));
        w.push(chunk(0.05, 100, 0.5)); // overflows
        assert!(w.release(40).is_empty());
        assert_eq!(w.pending_len(), 1);

        // Another producer still lands in the open window.
        w.push(chunk(0.06, 10, 0.25));
        let flushed = w.release(100);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0][55], 0.5);
        assert_eq!(flushed[0][65], 0.75);

        let out = concat(w.finish());
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(w.dropped_samples(), 0);
    }

    #[test]
    fn emitted_buffers_never_exceed_capacity() {
        let mut w = MergeWindow::new(&options(256));
        for i in 0..20 {
            w.push(chunk(i as f64 * 0.1, 137, 0.1));
        }
        let mut all = w.release(1_900);
        all.extend(w.finish());
        assert!(all.iter().all(|b| b.len() <= 256));
        let total: usize = all.iter().map(Vec::len).sum();
        assert_eq!(total, 1_900 + 137);
    }

    // ---- flushing ----------------------------------------------------------

    #[test]
    fn threshold_flushes_settled_prefix() {
        let mut w = MergeWindow::new(&MergeOptions {
            flush_threshold: 0.8,
            ..options(100)
        });
        w.push(chunk(0.0, 79, 0.1));
        assert!(w.release(79).is_empty());
        w.push(chunk(0.079, 1, 0.1));
        let out = w.release(80);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 80);
        assert_eq!(w.window_start_sample(), 80);
        assert!(w.is_window_empty());
    }

    #[test]
    fn threshold_flush_keeps_unsettled_audio() {
        let mut w = MergeWindow::new(&MergeOptions {
            flush_threshold: 0.8,
            ..options(100)
        });
        w.push(chunk(0.0, 95, 0.5));
        let out = w.release(85);
        assert_eq!(out[0].len(), 85);
        assert_eq!(w.window_start_sample(), 85);

        let rest = concat(w.finish());
        assert_eq!(rest, vec![0.5; 10]);
    }

    #[test]
    fn gap_is_filled_with_silent_buffers() {
        let mut w = MergeWindow::new(&options(100));
        w.push(chunk(0.0, 10, 0.5));
        w.push(chunk(0.35, 10, 0.5));
        let out = w.finish();
        let lens: Vec<usize> = out.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![100, 100, 100, 60]);
        assert!(out[1].iter().all(|&s| s == 0.0));
        assert_eq!(out[3][50], 0.5);
    }

    #[test]
    fn watermark_advances_windows() {
        let mut w = MergeWindow::new(&options(100));
        w.push(chunk(0.0, 50, 0.5));
        w.push(chunk(0.25, 10, 0.5));
        let out = w.release(250);
        assert_eq!(out.len(), 2);
        assert_eq!(w.window_start_sample(), 200);
        assert_eq!(w.pending_len(), 0);
        assert!(!w.is_window_empty());
    }

    #[test]
    fn late_samples_are_clipped() {
        let mut w = MergeWindow::new(&options(100));
        w.push(chunk(0.0, 100, 0.5));
        assert_eq!(w.release(100).len(), 1);
        w.push(chunk(0.05, 100, 0.25));
        let out = concat(w.finish());
        assert_eq!(w.dropped_samples(), 50);
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn empty_window_finishes_with_nothing() {
        let mut w = MergeWindow::new(&options(100));
        assert!(w.finish().is_empty());
    }

    #[test]
    fn sanitized_clamps_invalid_values() {
        let opts = MergeOptions {
            capacity: 0,
            flush_threshold: 1.5,
            ..MergeOptions::default()
        }
        .sanitized();
        assert_eq!(opts.capacity, 1);
        assert_eq!(opts.flush_threshold, 1.0);
    }

    #[test]
    fn origin_shifts_positions() {
        let w = MergeWindow::new(&MergeOptions {
            origin: 10.0,
            ..options(100)
        });
        assert_eq!(w.sample_index(10.5), 500);
    }
}
