//! Injectable counter sink for the flusher's stats.
//!
//! The core never owns the metrics pipeline; it increments named counters
//! through [`StatsSink`] so the embedding proxy can wire them into whatever
//! scope it already maintains. [`AtomicCounters`] is a self-contained default
//! so the crate is usable without a caller-supplied sink.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters incremented by the flusher.
///
/// Implementations must be cheap to call from the flusher thread; they are
/// invoked once per flush cycle, not once per byte.
pub trait StatsSink: Send + Sync {
    /// Bytes appended to the front buffer by a producer.
    fn add_write_buffered(&self, bytes: u64);
    /// Bytes successfully written to the descriptor.
    fn add_write_completed(&self, bytes: u64);
    /// Bytes discarded because a write syscall failed or no descriptor was open.
    fn add_write_failed(&self, bytes: u64);
    /// Unsuccessful `open` attempts during a reopen cycle.
    fn add_reopen_failed(&self, count: u64);
}

/// Default in-process [`StatsSink`] backed by atomics.
#[derive(Default)]
pub struct AtomicCounters {
    write_buffered: AtomicU64,
    write_completed: AtomicU64,
    write_failed: AtomicU64,
    reopen_failed: AtomicU64,
}

impl AtomicCounters {
    /// Create a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current counter values for diagnostic logging.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            write_buffered: self.write_buffered.load(Ordering::Relaxed),
            write_completed: self.write_completed.load(Ordering::Relaxed),
            write_failed: self.write_failed.load(Ordering::Relaxed),
            reopen_failed: self.reopen_failed.load(Ordering::Relaxed),
        }
    }
}

impl StatsSink for AtomicCounters {
    fn add_write_buffered(&self, bytes: u64) {
        self.write_buffered.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_write_completed(&self, bytes: u64) {
        self.write_completed.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_write_failed(&self, bytes: u64) {
        self.write_failed.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_reopen_failed(&self, count: u64) {
        self.reopen_failed.fetch_add(count, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of [`AtomicCounters`], serialisable for a
/// diagnostic dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub write_buffered: u64,
    pub write_completed: u64,
    pub write_failed: u64,
    pub reopen_failed: u64,
}
