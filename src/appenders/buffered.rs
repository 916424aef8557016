//! Asynchronous bounded-queue output
//!
//! [`BufferedOutput`] wraps another [`TextOutput`] with a fixed-capacity
//! queue and one delivery thread. Producers enqueue rendered lines and
//! return; the worker writes them to the wrapped output in submission
//! order. A full queue is handled by the [`OverflowPolicy`]: the producer
//! waits, or the incoming line is dropped and counted. Queued lines are
//! never evicted or reordered.
//!
//! Shutdown closes the queue and waits for the worker to drain it. If the
//! drain timeout expires, whatever is still queued is counted as lost.

use crate::core::diagnostics;
use crate::core::handler::deliver;
use crate::core::{
    LogLevel, LoggerError, OutputMetrics, OverflowCallback, OverflowPolicy, Result, TextOutput,
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default drain timeout used when a buffered output is dropped without
/// explicit shutdown (5 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Pending {
    level: LogLevel,
    line: Vec<u8>,
}

struct WorkerCounters {
    abandon: Arc<AtomicBool>,
    queued: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
}

/// Outcome of draining a buffered output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Lines written to the wrapped output over the output's lifetime
    pub delivered: u64,
    /// Lines still queued when the drain timed out
    pub lost: u64,
    pub timed_out: bool,
}

impl DrainReport {
    pub fn merge(self, other: DrainReport) -> DrainReport {
        DrainReport {
            delivered: self.delivered + other.delivered,
            lost: self.lost + other.lost,
            timed_out: self.timed_out || other.timed_out,
        }
    }
}

pub struct BufferedOutput {
    name: String,
    capacity: usize,
    sender: RwLock<Option<Sender<Pending>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    abandon: Arc<AtomicBool>,
    /// Accepted lines the worker has not taken yet, including producers
    /// blocked on a full queue
    queued: Arc<AtomicU64>,
    /// Accepted lines the worker has not finished with
    in_flight: Arc<AtomicU64>,
    inner: Arc<dyn TextOutput>,
    metrics: Arc<OutputMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl BufferedOutput {
    /// Wrap `inner` with a queue of `capacity` lines using the blocking policy
    pub fn new(inner: Arc<dyn TextOutput>, capacity: usize) -> Self {
        Self::builder(inner).capacity(capacity).build()
    }

    #[must_use]
    pub fn builder(inner: Arc<dyn TextOutput>) -> BufferedOutputBuilder {
        BufferedOutputBuilder::new(inner)
    }

    fn start(
        inner: Arc<dyn TextOutput>,
        capacity: usize,
        overflow_policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<Pending>(capacity);
        let metrics = Arc::new(OutputMetrics::new());
        let abandon = Arc::new(AtomicBool::new(false));
        let queued = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::new(AtomicU64::new(0));
        let name = format!("buffered({})", inner.name());

        let worker = {
            let inner = Arc::clone(&inner);
            let metrics = Arc::clone(&metrics);
            let counters = WorkerCounters {
                abandon: Arc::clone(&abandon),
                queued: Arc::clone(&queued),
                in_flight: Arc::clone(&in_flight),
            };
            thread::Builder::new()
                .name(format!("log-{}", inner.name()))
                .spawn(move || Self::run_worker(receiver, inner, metrics, counters))
        };

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a worker every write is refused and reported
                diagnostics::report_error(format!("Failed to start delivery thread for {}: {}", name, e));
                None
            }
        };
        let sender = if worker.is_some() { Some(sender) } else { None };

        Self {
            name,
            capacity,
            sender: RwLock::new(sender),
            worker: Mutex::new(worker),
            abandon,
            queued,
            in_flight,
            inner,
            metrics,
            overflow_policy,
            on_overflow,
        }
    }

    fn run_worker(
        receiver: Receiver<Pending>,
        inner: Arc<dyn TextOutput>,
        metrics: Arc<OutputMetrics>,
        counters: WorkerCounters,
    ) {
        // Ends once every sender is gone and the queue is empty
        for pending in receiver.iter() {
            counters.queued.fetch_sub(1, Ordering::AcqRel);
            let result = catch_unwind(AssertUnwindSafe(|| {
                if counters.abandon.load(Ordering::Acquire) {
                    metrics.record_lost(1);
                } else {
                    deliver(inner.as_ref(), pending.level, &pending.line, &metrics);
                }
            }));
            if result.is_err() {
                metrics.record_write_failure();
            }
            counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        }

        if !counters.abandon.load(Ordering::Acquire) {
            let _ = catch_unwind(AssertUnwindSafe(|| {
                if let Err(e) = inner.flush() {
                    diagnostics::report_error(format!("Output '{}' flush failed: {}", inner.name(), e));
                }
            }));
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Lines waiting in the queue, including producers blocked on it
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire) as usize
    }

    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    fn enqueue(&self, pending: Pending) -> Result<()> {
        // Clone out of the lock so a blocked producer never holds it
        let sender = self
            .sender
            .read()
            .as_ref()
            .cloned()
            .ok_or(LoggerError::OutputStopped)?;

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.queued.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(pending) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(pending)) => self.handle_overflow(&sender, pending),
            Err(TrySendError::Disconnected(_)) => {
                self.release();
                Err(LoggerError::OutputStopped)
            }
        }
    }

    /// Undo the accounting for a line that never reached the worker
    fn release(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// A disconnect while waiting means the worker is gone
    fn handle_overflow(&self, sender: &Sender<Pending>, pending: Pending) -> Result<()> {
        self.metrics.record_queue_full();

        match self.overflow_policy {
            OverflowPolicy::Block => {
                self.metrics.record_block();
                if sender.send(pending).is_err() {
                    self.release();
                    self.metrics.record_lost(1);
                    return Err(LoggerError::OutputStopped);
                }
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(pending, timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.drop_incoming(),
                    Err(SendTimeoutError::Disconnected(_)) => {
                        self.release();
                        self.metrics.record_lost(1);
                        return Err(LoggerError::OutputStopped);
                    }
                }
            }
            OverflowPolicy::DropNewest => self.drop_incoming(),
        }
        Ok(())
    }

    fn drop_incoming(&self) {
        self.release();
        let previous = self.metrics.record_dropped();
        diagnostics::alert_rate_limited(previous, || {
            format!(
                "Queue of {} full ({} lines), dropping records",
                self.name, self.capacity
            )
        });
        if let Some(ref callback) = self.on_overflow {
            callback(previous + 1);
        }
    }

    /// Wait until every accepted line has been handled by the worker.
    ///
    /// Returns `false` if the timeout expired first.
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.in_flight.load(Ordering::Acquire) > 0 {
            if start.elapsed() >= timeout || !self.worker_alive() {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
        true
    }

    fn worker_alive(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop accepting lines and drain the queue within `timeout`.
    ///
    /// Lines still queued at the deadline are abandoned and reported as
    /// lost. Calling this again after a completed shutdown returns the
    /// final delivery count with nothing lost.
    pub fn shutdown(&self, timeout: Duration) -> DrainReport {
        drop(self.sender.write().take());

        let Some(handle) = self.worker.lock().take() else {
            return DrainReport {
                delivered: self.metrics.written_count(),
                lost: 0,
                timed_out: false,
            };
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(panic_info) = handle.join() {
                    diagnostics::report_panic(&format!("Delivery thread of {}", self.name), panic_info.as_ref());
                }
                return DrainReport {
                    delivered: self.metrics.written_count(),
                    lost: 0,
                    timed_out: false,
                };
            }

            if start.elapsed() >= timeout {
                self.abandon.store(true, Ordering::Release);
                let lost = self.queued.load(Ordering::Acquire);
                diagnostics::report_warning(format!(
                    "{} did not drain within {:?}; {} queued lines lost.",
                    self.name, timeout, lost
                ));
                return DrainReport {
                    delivered: self.metrics.written_count(),
                    lost,
                    timed_out: true,
                };
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TextOutput for BufferedOutput {
    fn output(&self, level: LogLevel, line: &[u8]) -> Result<()> {
        self.enqueue(Pending {
            level,
            line: line.to_vec(),
        })
    }

    fn flush(&self) -> Result<()> {
        if !self.flush_timeout(DEFAULT_SHUTDOWN_TIMEOUT) {
            return Err(LoggerError::writer(format!(
                "{} still had queued lines after {:?}",
                self.name, DEFAULT_SHUTDOWN_TIMEOUT
            )));
        }
        self.inner.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for BufferedOutput {
    fn drop(&mut self) {
        let report = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

        let dropped = self.metrics.dropped_count();
        if dropped > 0 || report.lost > 0 {
            diagnostics::report_warning(format!(
                "{} closed with {} dropped and {} lost lines (loss rate: {:.2}%)",
                self.name,
                dropped,
                report.lost,
                self.metrics.loss_rate()
            ));
        }
    }
}

/// Builder for [`BufferedOutput`]
///
/// # Example
/// ```
/// use named_logger_system::appenders::{BufferedOutput, WriterOutput};
/// use named_logger_system::OverflowPolicy;
/// use std::sync::Arc;
///
/// let output = BufferedOutput::builder(Arc::new(WriterOutput::stderr()))
///     .capacity(1024)
///     .overflow_policy(OverflowPolicy::DropNewest)
///     .on_overflow(Arc::new(|count| eprintln!("{} lines dropped", count)))
///     .build();
/// assert_eq!(output.capacity(), 1024);
/// ```
pub struct BufferedOutputBuilder {
    inner: Arc<dyn TextOutput>,
    capacity: usize,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl BufferedOutputBuilder {
    pub fn new(inner: Arc<dyn TextOutput>) -> Self {
        Self {
            inner,
            capacity: 1024,
            overflow_policy: OverflowPolicy::Block,
            on_overflow: None,
        }
    }

    /// Queue capacity; values below 1 are raised to 1
    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running drop total whenever a line is dropped
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn build(self) -> BufferedOutput {
        BufferedOutput::start(
            self.inner,
            self.capacity,
            self.overflow_policy,
            self.on_overflow,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    /// Records lines; optionally waits for a permit before each write
    struct Gate {
        lines: Mutex<Vec<String>>,
        entered: Sender<()>,
        permits: Option<Receiver<()>>,
    }

    impl Gate {
        fn open() -> (Arc<Self>, Receiver<()>) {
            let (entered, entered_rx) = unbounded();
            (
                Arc::new(Self {
                    lines: Mutex::new(Vec::new()),
                    entered,
                    permits: None,
                }),
                entered_rx,
            )
        }

        fn gated() -> (Arc<Self>, Receiver<()>, Sender<()>) {
            let (entered, entered_rx) = unbounded();
            let (permit_tx, permit_rx) = unbounded();
            (
                Arc::new(Self {
                    lines: Mutex::new(Vec::new()),
                    entered,
                    permits: Some(permit_rx),
                }),
                entered_rx,
                permit_tx,
            )
        }
    }

    impl TextOutput for Gate {
        fn output(&self, _level: LogLevel, line: &[u8]) -> Result<()> {
            let _ = self.entered.send(());
            if let Some(ref permits) = self.permits {
                let _ = permits.recv();
            }
            self.lines.lock().push(String::from_utf8_lossy(line).into_owned());
            Ok(())
        }

        fn name(&self) -> &str {
            "gate"
        }
    }

    #[test]
    fn test_fifo_delivery() {
        let (gate, _entered) = Gate::open();
        let output = BufferedOutput::new(gate.clone(), 8);

        for i in 0..200 {
            output.output(LogLevel::Info, format!("m{}", i).as_bytes()).unwrap();
        }
        let report = output.shutdown(Duration::from_secs(5));

        let expected: Vec<String> = (0..200).map(|i| format!("m{}", i)).collect();
        assert_eq!(*gate.lines.lock(), expected);
        assert_eq!(report.delivered, 200);
        assert_eq!(report.lost, 0);
        assert!(!report.timed_out);
    }

    #[test]
    fn test_block_policy_suspends_producer() {
        let (gate, entered, permits) = Gate::gated();
        let output = Arc::new(BufferedOutput::new(gate.clone(), 2));

        // First line is taken by the worker and held at the gate
        output.output(LogLevel::Info, b"0").unwrap();
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        output.output(LogLevel::Info, b"1").unwrap();
        output.output(LogLevel::Info, b"2").unwrap();
        assert_eq!(output.queued(), 2);

        let (done_tx, done_rx) = unbounded();
        let producer = {
            let output = Arc::clone(&output);
            thread::spawn(move || {
                output.output(LogLevel::Info, b"3").unwrap();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(output.metrics().block_events(), 1);

        permits.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        for _ in 0..3 {
            permits.send(()).unwrap();
        }
        assert!(output.flush_timeout(Duration::from_secs(5)));
        assert_eq!(*gate.lines.lock(), vec!["0", "1", "2", "3"]);
        assert_eq!(output.metrics().dropped_count(), 0);
    }

    #[test]
    fn test_drop_newest_keeps_order_and_counts() {
        let (gate, entered, permits) = Gate::gated();
        let callbacks = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&callbacks);
        let output = BufferedOutput::builder(gate.clone())
            .capacity(2)
            .overflow_policy(OverflowPolicy::DropNewest)
            .on_overflow(Arc::new(move |total| {
                seen.store(total, Ordering::SeqCst);
            }))
            .build();

        output.output(LogLevel::Info, b"0").unwrap();
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        for i in 1..10 {
            output.output(LogLevel::Info, format!("{}", i).as_bytes()).unwrap();
        }

        for _ in 0..3 {
            permits.send(()).unwrap();
        }
        let report = output.shutdown(Duration::from_secs(5));

        assert_eq!(*gate.lines.lock(), vec!["0", "1", "2"]);
        assert_eq!(output.metrics().dropped_count(), 7);
        assert_eq!(callbacks.load(Ordering::SeqCst), 7);
        assert_eq!(report.lost, 0);
    }

    #[test]
    fn test_block_with_timeout_drops_after_wait() {
        let (gate, entered, permits) = Gate::gated();
        let output = BufferedOutput::builder(gate.clone())
            .capacity(1)
            .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(20)))
            .build();

        output.output(LogLevel::Info, b"0").unwrap();
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        output.output(LogLevel::Info, b"1").unwrap();
        output.output(LogLevel::Info, b"2").unwrap();

        assert_eq!(output.metrics().dropped_count(), 1);
        assert_eq!(output.metrics().block_events(), 1);

        permits.send(()).unwrap();
        permits.send(()).unwrap();
        output.shutdown(Duration::from_secs(5));
        assert_eq!(*gate.lines.lock(), vec!["0", "1"]);
    }

    #[test]
    fn test_shutdown_timeout_counts_lost() {
        let (gate, entered, permits) = Gate::gated();
        let output = BufferedOutput::new(gate.clone(), 4);

        for i in 0..4 {
            output.output(LogLevel::Info, format!("{}", i).as_bytes()).unwrap();
        }
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        let report = output.shutdown(Duration::from_millis(50));
        assert!(report.timed_out);
        assert_eq!(report.lost, 3);

        // Release the stuck write; the rest are discarded and accounted
        permits.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while output.metrics().lost_on_shutdown() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(output.metrics().lost_on_shutdown(), 3);
        assert_eq!(*gate.lines.lock(), vec!["0"]);
    }

    #[test]
    fn test_write_after_shutdown_is_refused() {
        let (gate, _entered) = Gate::open();
        let output = BufferedOutput::new(gate, 4);
        output.shutdown(Duration::from_secs(1));

        assert!(!output.is_running());
        assert!(matches!(
            output.output(LogLevel::Info, b"late"),
            Err(LoggerError::OutputStopped)
        ));
        let again = output.shutdown(Duration::from_secs(1));
        assert_eq!(again.lost, 0);
    }

    /// Fails every write by panicking
    struct Exploding;

    impl TextOutput for Exploding {
        fn output(&self, _level: LogLevel, _line: &[u8]) -> Result<()> {
            panic!("sink exploded");
        }

        fn name(&self) -> &str {
            "exploding"
        }
    }

    #[test]
    fn test_panicking_sink_never_stalls_producers() {
        let output = Arc::new(BufferedOutput::new(Arc::new(Exploding), 1));

        let (done_tx, done_rx) = unbounded();
        let producer = {
            let output = Arc::clone(&output);
            thread::spawn(move || {
                for i in 0..20 {
                    let _ = output.output(LogLevel::Info, format!("{}", i).as_bytes());
                }
                done_tx.send(()).unwrap();
            })
        };

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("producer must not block behind a failing sink");
        producer.join().unwrap();

        assert!(output.flush_timeout(Duration::from_secs(5)));
        assert_eq!(output.metrics().write_failures(), 20);
        assert_eq!(output.queued(), 0);
        assert!(output.is_running());
    }

    #[test]
    fn test_many_producers_no_duplicates() {
        let (gate, _entered) = Gate::open();
        let output = Arc::new(BufferedOutput::new(gate.clone(), 16));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let output = Arc::clone(&output);
                thread::spawn(move || {
                    for i in 0..250 {
                        output
                            .output(LogLevel::Info, format!("{}-{}", t, i).as_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        output.shutdown(Duration::from_secs(5));

        let lines = gate.lines.lock();
        assert_eq!(lines.len(), 1000);
        for t in 0..4 {
            let prefix = format!("{}-", t);
            let mine: Vec<usize> = lines
                .iter()
                .filter(|l| l.starts_with(&prefix))
                .map(|l| l[prefix.len()..].parse().unwrap())
                .collect();
            assert_eq!(mine, (0..250).collect::<Vec<_>>());
        }
    }
}
