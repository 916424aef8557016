//! Side channel for failures inside the logging pipeline
//!
//! The pipeline cannot report its own failures through itself, so they go
//! straight to the process's standard error. Writes that fail are ignored:
//! stderr may be a closed pipe once output capture is active, and the
//! side channel must never take a delivery thread down with it.

use std::any::Any;
use std::fmt;
use std::io::{self, Write};

fn side_channel(prefix: &str, message: fmt::Arguments<'_>) {
    let _ = writeln!(io::stderr().lock(), "[LOGGER {}] {}", prefix, message);
}

/// Print on the first occurrence and every 1000th after that.
///
/// `previous` is the counter value before this occurrence was recorded.
pub(crate) fn alert_rate_limited(previous: u64, message: impl FnOnce() -> String) {
    if previous == 0 || (previous + 1) % 1000 == 0 {
        side_channel("WARNING", format_args!("{} (occurrence {})", message(), previous + 1));
    }
}

pub(crate) fn report_warning(message: impl AsRef<str>) {
    side_channel("WARNING", format_args!("{}", message.as_ref()));
}

pub(crate) fn report_error(message: impl AsRef<str>) {
    side_channel("ERROR", format_args!("{}", message.as_ref()));
}

pub(crate) fn report_panic(context: &str, panic_info: &(dyn Any + Send)) {
    side_channel(
        "CRITICAL",
        format_args!(
            "{} panicked: {}. Logging continues.",
            context,
            panic_message(panic_info)
        ),
    );
}

pub(crate) fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
