//! Bridge from the `log` crate facade
//!
//! Records emitted through `log::info!` and friends by dependencies are
//! funneled into one [`Logger`] at a single configured level. Caller
//! annotation is omitted: the file and line the facade reports are
//! folded into the message instead.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::log_record::Caller;
use super::logger::Logger;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub struct StdLogBridge {
    logger: ArcSwap<Logger>,
    level: AtomicU8,
}

impl StdLogBridge {
    fn new(logger: Arc<Logger>, level: LogLevel) -> Self {
        Self {
            logger: ArcSwap::new(logger),
            level: AtomicU8::new(level as u8),
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(LogLevel::Warn)
    }

    fn retarget(&self, logger: Arc<Logger>, level: LogLevel) {
        self.logger.store(logger);
        self.level.store(level as u8, Ordering::Relaxed);
    }

    fn message(record: &log::Record<'_>) -> String {
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => format!("{}:{}: {}", short_file(file), line, record.args()),
            _ => record.args().to_string(),
        }
    }
}

fn short_file(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl log::Log for StdLogBridge {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        self.logger.load().level_enabled(self.level())
    }

    fn log(&self, record: &log::Record<'_>) {
        let logger = self.logger.load();
        let level = self.level();
        if logger.level_enabled(level) {
            logger.log_with_caller(level, &Self::message(record), Caller::Omitted);
        }
    }

    fn flush(&self) {}
}

/// Guards installation only; logging goes through the installed bridge
static INSTALLED: Mutex<Option<&'static StdLogBridge>> = Mutex::new(None);

/// Route `log` crate records to `logger` at `level`.
///
/// The first call installs the bridge as the process's `log` logger;
/// later calls retarget it. Fails if another `log` implementation was
/// installed first.
pub fn install_std_log_bridge(logger: Arc<Logger>, level: LogLevel) -> Result<()> {
    let mut installed = INSTALLED.lock();
    if let Some(bridge) = *installed {
        bridge.retarget(logger, level);
        return Ok(());
    }

    let bridge: &'static StdLogBridge = Box::leak(Box::new(StdLogBridge::new(logger, level)));
    log::set_logger(bridge).map_err(|e| LoggerError::config("std log bridge", e.to_string()))?;
    log::set_max_level(log::LevelFilter::Trace);
    *installed = Some(bridge);
    Ok(())
}

/// The installed bridge, if any
pub fn std_log_bridge() -> Option<&'static StdLogBridge> {
    *INSTALLED.lock()
}
