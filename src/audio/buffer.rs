//! Fixed-capacity additive mixing buffer for `f32` audio samples.
//!
//! Unlike a ring buffer, [`MixBuffer`] never overwrites: samples written at an
//! offset are **added** to whatever is already there, so independent sources
//! covering the same time range are layered.  Writes past the capacity are
//! cut off and reported to the caller, which decides where the rest goes.
//!
//! # Example
//!
//! ```rust
//! use timed_tts::audio::MixBuffer;
//!
//! let mut buf = MixBuffer::new(4);
//! buf.mix_at(0, &[0.25, 0.25]);
//! buf.mix_at(1, &[0.5, 0.5]);
//! assert_eq!(buf.filled(), 3);
//! assert_eq!(buf.take_filled(), vec![0.25, 0.75, 0.5]);
//! ```

// ---------------------------------------------------------------------------
// MixBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity accumulation buffer with a high-water mark.
///
/// ## Overflow behaviour
///
/// [`mix_at`](Self::mix_at) writes at most `capacity - offset` samples and
/// returns how many it consumed.  The buffer never grows beyond its initial
/// capacity.
#[derive(Debug, Clone)]
pub struct MixBuffer {
    buf: Vec<f32>,
    capacity: usize,
    /// One past the furthest sample written since the last reset.
    filled: usize,
}

impl MixBuffer {
    /// Create a silent buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "MixBuffer capacity must be > 0");
        Self {
            buf: vec![0.0; capacity],
            capacity,
            filled: 0,
        }
    }

    /// Add `samples` into the buffer starting at `offset`.
    ///
    /// Returns the number of samples consumed; anything beyond the capacity
    /// is left for the caller.
    pub fn mix_at(&mut self, offset: usize, samples: &[f32]) -> usize {
        if offset >= self.capacity {
            return 0;
        }
        let n = samples.len().min(self.capacity - offset);
        for (dst, &src) in self.buf[offset..offset + n].iter_mut().zip(samples) {
            *dst += src;
        }
        if n > 0 {
            self.filled = self.filled.max(offset + n);
        }
        n
    }

    /// Remove the whole buffer, including trailing silence, and reset.
    ///
    /// The returned vector always has exactly `capacity` samples.
    pub fn take_full(&mut self) -> Vec<f32> {
        self.filled = 0;
        std::mem::replace(&mut self.buf, vec![0.0; self.capacity])
    }

    /// Remove only the samples up to the high-water mark, and reset.
    pub fn take_filled(&mut self) -> Vec<f32> {
        let filled = self.filled;
        let mut out = self.take_full();
        out.truncate(filled);
        out
    }

    /// Remove the first `len` samples and shift the rest to the front.
    ///
    /// The high-water mark moves back by `len`; the freed space at the end
    /// is silent.
    pub fn take_prefix(&mut self, len: usize) -> Vec<f32> {
        let len = len.min(self.capacity);
        let out = self.buf[..len].to_vec();
        self.buf.copy_within(len.., 0);
        self.buf[self.capacity - len..].fill(0.0);
        self.filled = self.filled.saturating_sub(len);
        out
    }

    /// Silence the buffer without returning its contents.
    pub fn clear(&mut self) {
        self.buf.iter_mut().for_each(|s| *s = 0.0);
        self.filled = 0;
    }

    /// High-water mark: one past the furthest sample written.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Fraction of the capacity below the high-water mark.
    pub fn fill_ratio(&self) -> f32 {
        self.filled as f32 / self.capacity as f32
    }

    /// Returns `true` when nothing has been written since the last reset.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read-only view of the whole buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.buf
    }

    /// Buffered duration in seconds, up to the high-water mark.
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.filled as f64 / sample_rate as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
