//! TextOutput trait for rendered log lines

use super::{error::Result, log_level::LogLevel};

/// Delivers rendered lines to a sink.
///
/// Implementations are shared between threads, so writes take `&self`
/// and use interior locking. A failed write is returned, never panicked.
pub trait TextOutput: Send + Sync {
    /// Write one rendered line (newline included). The level is passed
    /// along for sinks that classify lines, such as syslog.
    fn output(&self, level: LogLevel, line: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
