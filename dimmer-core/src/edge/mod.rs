//! Interrupt-to-consumer handoff for zero-cross edge timestamps.
//!
//! The edge interrupt is the only producer and the controller's polling (or
//! directly-chained) path is the only consumer, so a single atomic latch with
//! read-and-clear semantics replaces the raw volatile flags such detectors
//! are traditionally wired with. Each recorded edge is consumed at most once.

use portable_atomic::{AtomicBool, AtomicU64, Ordering};

/// Single-producer, single-consumer latch for the most recent edge timestamp.
///
/// A second edge arriving before the consumer runs overwrites the stored
/// timestamp (latest wins); the resulting doubled interval then falls outside
/// the acceptance band and is rejected like any other glitch.
#[derive(Debug)]
pub struct EdgeLatch {
    pending: AtomicBool,
    stamp_us: AtomicU64,
}

impl EdgeLatch {
    /// Creates an empty latch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            stamp_us: AtomicU64::new(0),
        }
    }

    /// Records an edge timestamp. Producer side; interrupt-safe.
    pub fn record(&self, timestamp_us: u64) {
        self.stamp_us.store(timestamp_us, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Consumes the pending edge, if any. Consumer side.
    ///
    /// The pending flag is cleared exactly once per returned timestamp.
    pub fn take(&self) -> Option<u64> {
        if self.pending.swap(false, Ordering::Acquire) {
            Some(self.stamp_us.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Returns `true` when an edge is waiting to be consumed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }
}

impl Default for EdgeLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Polling view of a rising-edge notification source.
pub trait EdgeSource {
    /// Returns the next unconsumed edge timestamp in microseconds, if any.
    fn poll_edge(&mut self) -> Option<u64>;
}

impl EdgeSource for &EdgeLatch {
    fn poll_edge(&mut self) -> Option<u64> {
        self.take()
    }
}
