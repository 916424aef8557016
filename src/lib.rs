//! # Named Logger System
//!
//! Process-wide structured logging with named loggers.
//!
//! ## Features
//!
//! - **Named loggers**: levels and handlers are chosen per logger name by
//!   pattern rules, and the most recently registered matching rule wins
//! - **Cheap when disabled**: a disabled call is one atomic load, with no
//!   formatting or allocation
//! - **Outputs**: standard streams, files, syslog, and a bounded
//!   background queue with an explicit overflow policy
//! - **Output capture**: stdout and stderr can be piped into a collector
//!   process such as `logger`
//!
//! ## Example
//!
//! ```
//! use named_logger_system::{get_logger_named, info, set_level, LogLevel};
//!
//! set_level(Some("^db"), LogLevel::Debug).unwrap();
//!
//! let logger = get_logger_named("db.pool");
//! info!(logger, "opened {} connections", 8);
//! ```

pub mod appenders;
pub mod capture;
pub mod core;
pub mod macros;
pub mod setup;

pub mod prelude {
    pub use crate::appenders::{BufferedOutput, DrainReport, Facility, SyslogOutput, WriterOutput};
    pub use crate::core::{
        Caller, Handler, LogLevel, LogRecord, Logger, LoggerError, NamePattern, OverflowPolicy,
        Result, Template, TextHandler, TextOutput,
    };
    pub use crate::setup::{setup, LogConfig};
    pub use crate::{get_logger_named, init, set_handler, set_level, shutdown};
}

pub use appenders::{
    BufferedOutput, BufferedOutputBuilder, DrainReport, Facility, SyslogOutput, WriterOutput,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use capture::{capture_active, capture_output_to_process, capture_session, CaptureSession};
pub use core::log_registry::{get_logger_named, global, init, set_handler, set_level, shutdown};
pub use core::{
    install_std_log_bridge, set_format_function, Caller, CallerLocation, FnHandler,
    FormatFunctions, Handler, HandlerRegistry, JsonHandler, LevelRegistry, LogLevel, LogRecord,
    LogRegistry, LogWriter, Logger, LoggerError, NamePattern, NullHandler, OutputMetrics,
    OverflowCallback, OverflowPolicy, Result, Template, TextHandler, TextOutput, TimestampFormat,
};
pub use setup::{must_setup, setup, setup_with_facility, LogConfig};
