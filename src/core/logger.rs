//! Named loggers
//!
//! A [`Logger`] is a cheap handle identified by its name. Every call
//! checks the effective level first; when the level is disabled nothing
//! is formatted or allocated. Enabled calls resolve the handler for the
//! logger's name and pass the message on.

use super::diagnostics;
use super::log_level::LogLevel;
use super::log_record::Caller;
use super::registry::{HandlerRegistry, LevelRegistry};
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache encoding: `(generation + 1) << 8 | level`, zero when empty
const LEVEL_BITS: u32 = 8;

pub struct Logger {
    name: String,
    levels: Arc<LevelRegistry>,
    handlers: Arc<HandlerRegistry>,
    level_cache: AtomicU64,
}

impl Logger {
    pub(crate) fn new(
        name: impl Into<String>,
        levels: Arc<LevelRegistry>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            levels,
            handlers,
            level_cache: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current effective level, re-resolved only after a registry change
    #[inline]
    pub fn effective_level(&self) -> LogLevel {
        let tag = self.levels.generation() + 1;
        let cached = self.level_cache.load(Ordering::Relaxed);
        if cached >> LEVEL_BITS == tag {
            if let Some(level) = LogLevel::from_u8(cached as u8) {
                return level;
            }
        }

        let level = self.levels.effective_level(&self.name);
        self.level_cache
            .store((tag << LEVEL_BITS) | level as u64, Ordering::Relaxed);
        level
    }

    #[inline]
    pub fn level_enabled(&self, level: LogLevel) -> bool {
        self.effective_level() <= level
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        if self.level_enabled(level) {
            self.dispatch(level, message.as_ref(), Caller::here());
        }
    }

    /// Format `args` only if `level` is enabled
    #[track_caller]
    pub fn log_fmt(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if self.level_enabled(level) {
            let caller = Caller::here();
            match args.as_str() {
                Some(message) => self.dispatch(level, message, caller),
                None => self.dispatch(level, &args.to_string(), caller),
            }
        }
    }

    /// Build the message only if `level` is enabled
    #[track_caller]
    pub fn log_with<F>(&self, level: LogLevel, build: F)
    where
        F: FnOnce() -> String,
    {
        if self.level_enabled(level) {
            self.dispatch(level, &build(), Caller::here());
        }
    }

    /// Log with an explicit caller annotation
    pub fn log_with_caller(&self, level: LogLevel, message: &str, caller: Caller) {
        if self.level_enabled(level) {
            self.dispatch(level, message, caller);
        }
    }

    fn dispatch(&self, level: LogLevel, message: &str, caller: Caller) {
        let handler = self.handlers.resolve(&self.name);
        let result = catch_unwind(AssertUnwindSafe(|| {
            handler.log(&self.name, level, message, caller)
        }));
        if let Err(panic_info) = result {
            diagnostics::report_panic(&format!("Handler for '{}'", self.name), panic_info.as_ref());
        }
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    #[track_caller]
    pub fn notice(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Notice, message);
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    #[track_caller]
    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Critical, message);
    }

    #[inline]
    #[track_caller]
    pub fn trace_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Trace, args);
    }

    #[inline]
    #[track_caller]
    pub fn debug_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Debug, args);
    }

    #[inline]
    #[track_caller]
    pub fn info_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Info, args);
    }

    #[inline]
    #[track_caller]
    pub fn notice_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Notice, args);
    }

    #[inline]
    #[track_caller]
    pub fn warn_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Warn, args);
    }

    #[inline]
    #[track_caller]
    pub fn error_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Error, args);
    }

    #[inline]
    #[track_caller]
    pub fn critical_fmt(&self, args: fmt::Arguments<'_>) {
        self.log_fmt(LogLevel::Critical, args);
    }

    #[inline]
    pub fn trace_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Trace)
    }

    #[inline]
    pub fn debug_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Debug)
    }

    #[inline]
    pub fn info_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Info)
    }

    #[inline]
    pub fn notice_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Notice)
    }

    #[inline]
    pub fn warn_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Warn)
    }

    #[inline]
    pub fn error_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Error)
    }

    #[inline]
    pub fn critical_enabled(&self) -> bool {
        self.level_enabled(LogLevel::Critical)
    }

    /// `io::Write` adapter; each write becomes one record annotated with
    /// the location that created the writer
    #[track_caller]
    pub fn writer(self: &Arc<Self>, level: LogLevel) -> LogWriter {
        LogWriter {
            logger: Arc::clone(self),
            level,
            caller: Caller::here(),
        }
    }

    /// `io::Write` adapter without caller annotation
    pub fn writer_without_caller(self: &Arc<Self>, level: LogLevel) -> LogWriter {
        LogWriter {
            logger: Arc::clone(self),
            level,
            caller: Caller::Omitted,
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

/// Byte-stream front end for a [`Logger`]
pub struct LogWriter {
    logger: Arc<Logger>,
    level: LogLevel,
    caller: Caller,
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.logger.level_enabled(self.level) {
            // Byte-stream writers terminate each record with a newline
            let message = String::from_utf8_lossy(buf);
            let message = message.trim_end_matches(['\n', '\r']);
            self.logger.dispatch(self.level, message, self.caller);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
