//! Stress tests for concurrent logging
//!
//! Run with: cargo test --test stress_tests -- --nocapture

use named_logger_system::prelude::*;
use named_logger_system::{LogRegistry, OutputMetrics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counts lines without storing them
#[derive(Default)]
struct CountingOutput {
    lines: AtomicU64,
}

impl TextOutput for CountingOutput {
    fn output(&self, _level: LogLevel, _line: &[u8]) -> Result<()> {
        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Sleeps per line so the queue fills up
struct SlowOutput;

impl TextOutput for SlowOutput {
    fn output(&self, _level: LogLevel, _line: &[u8]) -> Result<()> {
        thread::sleep(Duration::from_micros(200));
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[test]
fn stress_test_concurrent_buffered_logging() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 5_000;

    let sink = Arc::new(CountingOutput::default());
    let buffered = Arc::new(BufferedOutput::new(sink.clone(), 256));
    let registry = Arc::new(LogRegistry::new(
        LogLevel::Info,
        Arc::new(TextHandler::new(Template::syslog(), buffered.clone())),
    ));
    registry.register_output(Arc::clone(&buffered));

    let start = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let logger = registry.get_logger_named(&format!("worker.{}", t));
                for i in 0..PER_THREAD {
                    logger.info(format!("message {}", i));
                    logger.debug("filtered out");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let report = registry.shutdown(Duration::from_secs(30));
    println!(
        "{} records through a 256-slot queue in {:?}",
        THREADS * PER_THREAD,
        start.elapsed()
    );

    // Block never drops
    assert_eq!(report.delivered, THREADS * PER_THREAD);
    assert_eq!(report.lost, 0);
    assert_eq!(sink.lines.load(Ordering::Relaxed), THREADS * PER_THREAD);
}

#[test]
fn stress_test_drop_newest_accounts_for_every_record() {
    const TOTAL: u64 = 2_000;

    let drops = Arc::new(AtomicU64::new(0));
    let seen_drops = Arc::clone(&drops);
    let buffered = BufferedOutput::builder(Arc::new(SlowOutput))
        .capacity(16)
        .overflow_policy(OverflowPolicy::DropNewest)
        .on_overflow(Arc::new(move |_| {
            seen_drops.fetch_add(1, Ordering::Relaxed);
        }))
        .build();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..TOTAL / 4 {
                    buffered
                        .output(LogLevel::Info, b"burst\n")
                        .expect("queue is open");
                }
            });
        }
    });

    let report = buffered.shutdown(Duration::from_secs(30));
    let metrics: &OutputMetrics = buffered.metrics();

    assert!(metrics.dropped_count() > 0, "a slow sink must overflow a 16-slot queue");
    assert_eq!(metrics.dropped_count(), drops.load(Ordering::Relaxed));
    assert_eq!(report.delivered + metrics.dropped_count(), TOTAL);
    assert_eq!(report.lost, 0);
}
