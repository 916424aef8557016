//! Output metrics for observability
//!
//! Counters for the fail-soft paths: records dropped on a full queue,
//! sink write failures, and records still queued when a drain timed out.

use std::sync::atomic::{AtomicU64, Ordering};

/// # Example
///
/// ```
/// use named_logger_system::OutputMetrics;
///
/// let metrics = OutputMetrics::new();
/// metrics.record_dropped();
/// metrics.record_written();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.written_count(), 1);
/// ```
#[derive(Debug)]
pub struct OutputMetrics {
    /// Records delivered to the sink
    written: AtomicU64,

    /// Records refused because the queue was full
    dropped: AtomicU64,

    /// Sink writes that returned an error or panicked
    write_failures: AtomicU64,

    /// Records abandoned in the queue when a drain timed out
    lost_on_shutdown: AtomicU64,

    /// Number of times a producer found the queue full
    queue_full_events: AtomicU64,

    /// Number of times a producer waited for queue space
    block_events: AtomicU64,
}

impl OutputMetrics {
    pub const fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            lost_on_shutdown: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn written_count(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lost_on_shutdown(&self) -> u64 {
        self.lost_on_shutdown.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Record a delivered record, returning the previous count
    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_lost(&self, count: u64) -> u64 {
        self.lost_on_shutdown.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of records that never reached the sink (0.0 - 100.0)
    pub fn loss_rate(&self) -> f64 {
        let lost = (self.dropped_count() + self.write_failures() + self.lost_on_shutdown()) as f64;
        let total = self.written_count() as f64 + lost;
        if total == 0.0 {
            0.0
        } else {
            (lost / total) * 100.0
        }
    }
}

impl Default for OutputMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for OutputMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            written: AtomicU64::new(self.written_count()),
            dropped: AtomicU64::new(self.dropped_count()),
            write_failures: AtomicU64::new(self.write_failures()),
            lost_on_shutdown: AtomicU64::new(self.lost_on_shutdown()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}
