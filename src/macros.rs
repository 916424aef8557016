//! Logging macros with `println!`-style formatting.
//!
//! Arguments are only formatted when the level is enabled for the
//! logger, and the caller annotation points at the macro call site.
//!
//! # Examples
//!
//! ```
//! use named_logger_system::{get_logger, info, warn};
//!
//! let logger = get_logger!();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! warn!(logger, "Port {} already in use, retrying", port);
//! ```

/// Log at an explicit level.
///
/// ```
/// use named_logger_system::{get_logger_named, log, LogLevel};
/// let logger = get_logger_named("macros.doc");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_fmt($level, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! notice {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Notice, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

/// Logger named after the calling module path, e.g. `my_app::db`
#[macro_export]
macro_rules! get_logger {
    () => {
        $crate::get_logger_named(::std::module_path!())
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Caller, FnHandler, LogLevel, LogRegistry};
    use parking_lot::Mutex;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted<'a>(&'a AtomicUsize);

    impl fmt::Display for Counted<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.fetch_add(1, Ordering::SeqCst);
            f.write_str("counted")
        }
    }

    #[test]
    fn test_macros_format_only_when_enabled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let registry = LogRegistry::new(
            LogLevel::Info,
            Arc::new(FnHandler(move |_: &str, level: LogLevel, message: &str, _: Caller| {
                sink.lock().push((level, message.to_string()));
            })),
        );
        let logger = registry.get_logger_named("macros");
        let formatted = AtomicUsize::new(0);

        debug!(logger, "value {}", Counted(&formatted));
        assert_eq!(formatted.load(Ordering::SeqCst), 0);

        info!(logger, "value {}", Counted(&formatted));
        critical!(logger, "plain");
        assert_eq!(formatted.load(Ordering::SeqCst), 1);
        assert_eq!(
            *seen.lock(),
            vec![
                (LogLevel::Info, "value counted".to_string()),
                (LogLevel::Critical, "plain".to_string()),
            ]
        );
    }

    #[test]
    fn test_get_logger_uses_module_path() {
        let logger = get_logger!();
        assert_eq!(logger.name(), "named_logger_system::macros::tests");
    }
}
