//! Delivery thread behavior when the side channel itself is broken
//!
//! Standard error is pointed at `/dev/full` for the whole binary, as
//! happens when output capture outlives its collector, so this file is
//! its own test binary.

use named_logger_system::prelude::*;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Refuses every line
struct Rejecting;

impl TextOutput for Rejecting {
    fn output(&self, _level: LogLevel, _line: &[u8]) -> Result<()> {
        Err(LoggerError::writer("disk full"))
    }

    fn name(&self) -> &str {
        "rejecting"
    }
}

#[test]
fn test_producers_return_when_stderr_is_unwritable() {
    let full = OpenOptions::new()
        .write(true)
        .open("/dev/full")
        .expect("Failed to open /dev/full");
    // SAFETY: both descriptors are open; fd 2 stays valid afterwards.
    let result = unsafe { libc::dup2(full.as_raw_fd(), libc::STDERR_FILENO) };
    assert_eq!(result, libc::STDERR_FILENO);

    let output = Arc::new(
        BufferedOutput::builder(Arc::new(Rejecting))
            .capacity(1)
            .overflow_policy(OverflowPolicy::Block)
            .build(),
    );

    // First failure triggers a side-channel report that cannot be written
    output
        .output(LogLevel::Error, b"first\n")
        .expect("queue is open");

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let producer = {
        let output = Arc::clone(&output);
        thread::spawn(move || {
            for line in ["second\n", "third\n", "fourth\n"] {
                let _ = output.output(LogLevel::Error, line.as_bytes());
            }
            let _ = done_tx.send(());
        })
    };

    done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("producer blocked after the side channel failed");
    producer.join().expect("Thread panicked");

    assert!(output.flush_timeout(Duration::from_secs(5)));
    assert_eq!(output.metrics().write_failures(), 4);

    let report = output.shutdown(Duration::from_secs(5));
    assert_eq!(report.lost, 0);
    assert!(!report.timed_out);
}
