//! Log record structure

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
    static THREAD_NAME_CACHE: RefCell<Option<Option<String>>> = const { RefCell::new(None) };
}

fn get_thread_id() -> String {
    THREAD_ID_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| format!("{:?}", std::thread::current().id()))
            .clone()
    })
}

fn get_thread_name() -> Option<String> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| std::thread::current().name().map(String::from))
            .clone()
    })
}

/// Where a log call came from.
///
/// `Omitted` is used by the byte-stream bridges, where the call site that
/// reaches the logger is the adapter itself and says nothing useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Location(&'static Location<'static>),
    Omitted,
}

impl Caller {
    #[track_caller]
    #[inline]
    pub fn here() -> Self {
        Caller::Location(Location::caller())
    }

    pub fn is_omitted(&self) -> bool {
        matches!(self, Caller::Omitted)
    }
}

/// Source location rendered into a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerLocation {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.file.rsplit('/').next().unwrap_or(&self.file);
        write!(f, "{}:{}", short, self.line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub name: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerLocation>,
    pub thread_id: String,
    pub thread_name: Option<String>,
}

impl LogRecord {
    pub fn new(name: &str, level: LogLevel, message: &str, caller: Caller) -> Self {
        let caller = match caller {
            Caller::Location(location) => Some(CallerLocation {
                file: location.file().to_string(),
                line: location.line(),
            }),
            Caller::Omitted => None,
        };

        Self {
            name: name.to_string(),
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            caller,
            thread_id: get_thread_id(),
            thread_name: get_thread_name(),
        }
    }

    pub fn thread_label(&self) -> &str {
        self.thread_name.as_deref().unwrap_or(&self.thread_id)
    }
}
