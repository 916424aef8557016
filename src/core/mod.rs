//! Core logger types and traits

pub mod bridge;
pub(crate) mod diagnostics;
pub mod error;
pub mod handler;
pub mod log_level;
pub mod log_record;
pub mod log_registry;
pub mod logger;
pub mod metrics;
pub mod name_pattern;
pub mod overflow_policy;
pub mod registry;
pub mod template;
pub mod text_output;
pub mod timestamp;

pub use bridge::{install_std_log_bridge, StdLogBridge};
pub use error::{LoggerError, Result};
pub use handler::{FnHandler, Handler, JsonHandler, NullHandler, TextHandler};
pub use log_level::LogLevel;
pub use log_record::{Caller, CallerLocation, LogRecord};
pub use log_registry::LogRegistry;
pub use logger::{LogWriter, Logger};
pub use metrics::OutputMetrics;
pub use name_pattern::NamePattern;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use registry::{HandlerRegistry, LevelRegistry, NameRule, RuleRegistry};
pub use template::{set_format_function, FormatFn, FormatFunctions, Template};
pub use text_output::TextOutput;
pub use timestamp::TimestampFormat;
