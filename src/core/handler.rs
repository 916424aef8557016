//! Handlers turn a log call into a rendered record and hand it to an output

use super::diagnostics;
use super::log_level::LogLevel;
use super::log_record::{Caller, LogRecord};
use super::metrics::OutputMetrics;
use super::template::Template;
use super::text_output::TextOutput;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receives every enabled log call.
///
/// `log` returns nothing: a handler that fails to deliver must count and
/// report the failure itself instead of surfacing it at the call site.
pub trait Handler: Send + Sync {
    fn log(&self, name: &str, level: LogLevel, message: &str, caller: Caller);
}

/// Write `line` to `output`, isolating errors and panics from the caller
pub(crate) fn deliver(output: &dyn TextOutput, level: LogLevel, line: &[u8], metrics: &OutputMetrics) {
    match catch_unwind(AssertUnwindSafe(|| output.output(level, line))) {
        Ok(Ok(())) => {
            metrics.record_written();
        }
        Ok(Err(e)) => {
            let previous = metrics.record_write_failure();
            diagnostics::alert_rate_limited(previous, || {
                format!("Output '{}' failed: {}", output.name(), e)
            });
        }
        Err(panic_info) => {
            metrics.record_write_failure();
            diagnostics::report_panic(&format!("Output '{}'", output.name()), panic_info.as_ref());
        }
    }
}

/// Renders records through a [`Template`] into a [`TextOutput`]
pub struct TextHandler {
    template: Template,
    output: Arc<dyn TextOutput>,
    metrics: Arc<OutputMetrics>,
}

impl TextHandler {
    pub fn new(template: Template, output: Arc<dyn TextOutput>) -> Self {
        Self {
            template,
            output,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn output(&self) -> &Arc<dyn TextOutput> {
        &self.output
    }

    /// Write counters for this handler's output
    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }

    fn render(&self, record: &LogRecord) -> String {
        match self.template.render(record) {
            Ok(line) => line,
            Err(e) => {
                diagnostics::report_error(format!(
                    "Template '{}' failed, writing plain line: {}",
                    self.template.source(),
                    e
                ));
                format!("{} {}: {}", record.name, record.level, record.message)
            }
        }
    }
}

impl Handler for TextHandler {
    fn log(&self, name: &str, level: LogLevel, message: &str, caller: Caller) {
        let record = LogRecord::new(name, level, message, caller);
        let mut line = self.render(&record);
        line.push('\n');
        deliver(self.output.as_ref(), level, line.as_bytes(), &self.metrics);
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'static str,
    name: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<String>,
    thread: &'a str,
}

/// One JSON object per line, for log shippers
pub struct JsonHandler {
    output: Arc<dyn TextOutput>,
    metrics: Arc<OutputMetrics>,
}

impl JsonHandler {
    pub fn new(output: Arc<dyn TextOutput>) -> Self {
        Self {
            output,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }

    pub fn render(record: &LogRecord) -> super::error::Result<String> {
        let line = JsonLine {
            timestamp: record.timestamp.to_rfc3339(),
            level: record.level.name(),
            name: &record.name,
            message: &record.message,
            caller: record.caller.as_ref().map(|c| c.to_string()),
            thread: record.thread_label(),
        };
        Ok(serde_json::to_string(&line)?)
    }
}

impl Handler for JsonHandler {
    fn log(&self, name: &str, level: LogLevel, message: &str, caller: Caller) {
        let record = LogRecord::new(name, level, message, caller);
        match Self::render(&record) {
            Ok(mut line) => {
                line.push('\n');
                deliver(self.output.as_ref(), level, line.as_bytes(), &self.metrics);
            }
            Err(e) => {
                let previous = self.metrics.record_write_failure();
                diagnostics::alert_rate_limited(previous, || format!("JSON encoding failed: {}", e));
            }
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl Handler for NullHandler {
    fn log(&self, _name: &str, _level: LogLevel, _message: &str, _caller: Caller) {}
}

/// Adapts a closure into a [`Handler`]
pub struct FnHandler<F>(pub F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, LogLevel, &str, Caller) + Send + Sync,
{
    fn log(&self, name: &str, level: LogLevel, message: &str, caller: Caller) {
        (self.0)(name, level, message, caller)
    }
}
