//! Process-wide logger registry
//!
//! [`LogRegistry`] owns the level and handler rule registries and interns
//! loggers by name. The process-wide instance is created by [`init`], or
//! lazily with [`LogLevel::DEFAULT`] on the first lookup, and lives until
//! the process exits. [`shutdown`] drains buffered outputs that were
//! registered with it; most processes never need to call it.

use super::handler::{Handler, TextHandler};
use super::log_level::LogLevel;
use super::logger::Logger;
use super::name_pattern::NamePattern;
use super::registry::{HandlerRegistry, LevelRegistry};
use super::template::Template;
use super::error::Result;
use crate::appenders::{BufferedOutput, DrainReport, WriterOutput};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

pub struct LogRegistry {
    levels: Arc<LevelRegistry>,
    handlers: Arc<HandlerRegistry>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    outputs: Mutex<Vec<Arc<BufferedOutput>>>,
}

impl LogRegistry {
    pub fn new(base_level: LogLevel, default_handler: Arc<dyn Handler>) -> Self {
        Self {
            levels: Arc::new(LevelRegistry::new(base_level)),
            handlers: Arc::new(HandlerRegistry::new(default_handler)),
            loggers: RwLock::new(HashMap::new()),
            outputs: Mutex::new(Vec::new()),
        }
    }

    /// Registry whose default handler writes standard-template lines to stderr
    pub fn with_level(base_level: LogLevel) -> Self {
        let handler = TextHandler::new(Template::standard(), Arc::new(WriterOutput::stderr()));
        Self::new(base_level, Arc::new(handler))
    }

    /// Logger for `name`, created on first use
    pub fn get_logger_named(&self, name: &str) -> Arc<Logger> {
        if let Some(logger) = self.loggers.read().get(name) {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write();
        let logger = loggers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Logger::new(
                name,
                Arc::clone(&self.levels),
                Arc::clone(&self.handlers),
            ))
        });
        Arc::clone(logger)
    }

    pub fn levels(&self) -> &LevelRegistry {
        &self.levels
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Names of every logger looked up so far
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loggers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Install a level rule; `None` sets the base level
    pub fn set_level(&self, pattern: Option<NamePattern>, level: LogLevel) {
        self.levels.set(pattern, level);
    }

    /// Install a handler rule; `None` replaces the default handler
    pub fn set_handler(&self, pattern: Option<NamePattern>, handler: Arc<dyn Handler>) {
        self.handlers.set(pattern, handler);
    }

    /// Drain `output` when this registry shuts down
    pub fn register_output(&self, output: Arc<BufferedOutput>) {
        self.outputs.lock().push(output);
    }

    /// Drain every registered buffered output, sharing one deadline
    pub fn shutdown(&self, timeout: Duration) -> DrainReport {
        let outputs: Vec<Arc<BufferedOutput>> = std::mem::take(&mut *self.outputs.lock());
        let deadline = Instant::now() + timeout;

        outputs.iter().fold(DrainReport::default(), |report, output| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            report.merge(output.shutdown(remaining))
        })
    }
}

static GLOBAL: OnceLock<LogRegistry> = OnceLock::new();

/// Create the process-wide registry with `base_level`.
///
/// If a lookup already created it lazily, the base level is updated.
pub fn init(base_level: LogLevel) -> &'static LogRegistry {
    let mut created = false;
    let registry = GLOBAL.get_or_init(|| {
        created = true;
        LogRegistry::with_level(base_level)
    });
    if !created {
        registry.levels().set_default(base_level);
    }
    registry
}

/// The process-wide registry
pub fn global() -> &'static LogRegistry {
    GLOBAL.get_or_init(|| LogRegistry::with_level(LogLevel::DEFAULT))
}

pub fn get_logger_named(name: &str) -> Arc<Logger> {
    global().get_logger_named(name)
}

/// Install a regex level rule on the process-wide registry; `None` or an
/// empty pattern sets the base level. Invalid patterns are rejected and
/// leave the rules unchanged.
pub fn set_level(pattern: Option<&str>, level: LogLevel) -> Result<()> {
    global().levels().set_level(pattern, level)
}

pub fn set_handler(pattern: Option<NamePattern>, handler: Arc<dyn Handler>) {
    global().set_handler(pattern, handler);
}

/// Drain the buffered outputs installed by `setup`
pub fn shutdown(timeout: Duration) -> DrainReport {
    global().shutdown(timeout)
}
