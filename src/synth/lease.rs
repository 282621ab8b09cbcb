//! Scoped compute resources.
//!
//! A backend that needs scratch memory (output buffers, uniform/params
//! blocks, staging copies) acquires it as a [`ComputeLease`].  Dropping the
//! lease releases it, so every exit path (success, `?` error or a cancelled
//! future being dropped mid-await) returns what it took.
//!
//! [`ResourceTracker`] counts acquisitions and releases; a balanced tracker
//! means nothing leaked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::trace;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    bytes_outstanding: AtomicUsize,
}

// ---------------------------------------------------------------------------
// ResourceTracker
// ---------------------------------------------------------------------------

/// Shared acquire/release counters.  Clones observe the same counts.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    counters: Arc<Counters>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a lease for `bytes` of scratch memory tagged `label`.
    pub fn acquire(&self, label: &'static str, bytes: usize) -> ComputeLease {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        self.counters
            .bytes_outstanding
            .fetch_add(bytes, Ordering::SeqCst);
        trace!("lease: acquire {label} ({bytes} bytes)");
        ComputeLease {
            counters: Arc::clone(&self.counters),
            label,
            bytes,
        }
    }

    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Leases currently alive.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    pub fn bytes_outstanding(&self) -> usize {
        self.counters.bytes_outstanding.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ComputeLease
// ---------------------------------------------------------------------------

/// RAII handle for one acquired resource.
#[derive(Debug)]
#[must_use = "dropping a lease releases it immediately"]
pub struct ComputeLease {
    counters: Arc<Counters>,
    label: &'static str,
    bytes: usize,
}

impl ComputeLease {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for ComputeLease {
    fn drop(&mut self) {
        self.counters
            .bytes_outstanding
            .fetch_sub(self.bytes, Ordering::SeqCst);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        trace!("lease: release {}", self.label);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_releases() {
        let tracker = ResourceTracker::new();
        {
            let lease = tracker.acquire("output", 64);
            assert_eq!(lease.bytes(), 64);
            assert_eq!(tracker.outstanding(), 1);
            assert_eq!(tracker.bytes_outstanding(), 64);
        }
        assert_eq!(tracker.acquired(), 1);
        assert_eq!(tracker.released(), 1);
        assert_eq!(tracker.bytes_outstanding(), 0);
    }

    #[test]
    fn clones_share_counts() {
        let tracker = ResourceTracker::new();
        let other = tracker.clone();
        let _a = tracker.acquire("a", 1);
        let _b = other.acquire("b", 1);
        assert_eq!(tracker.acquired(), 2);
        assert_eq!(other.outstanding(), 2);
    }

    #[test]
    fn release_on_error_path() {
        fn fails(tracker: &ResourceTracker) -> Result<(), &'static str> {
            let _lease = tracker.acquire("staging", 8);
            Err("boom")
        }
        let tracker = ResourceTracker::new();
        assert!(fails(&tracker).is_err());
        assert_eq!(tracker.outstanding(), 0);
    }
}
