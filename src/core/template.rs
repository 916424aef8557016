//! Line templates for text handlers
//!
//! A template is literal text with `{field}` placeholders and optional
//! `{Function field}` calls into registered [`FormatFunctions`]. Literal
//! braces are written `{{` and `}}`.
//!
//! Fields: `timestamp`, `time`, `level`, `name`, `message`, `caller`,
//! `pid`, `thread`.

use super::error::{LoggerError, Result};
use super::log_record::LogRecord;
use super::timestamp::TimestampFormat;
use colored::Colorize;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Extension function callable from a template.
///
/// Receives the record and the already rendered field text.
pub type FormatFn = Arc<dyn Fn(&LogRecord, &str) -> std::result::Result<String, String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Timestamp,
    Time,
    Level,
    Name,
    Message,
    Caller,
    Pid,
    Thread,
}

impl Field {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "timestamp" => Some(Field::Timestamp),
            "time" => Some(Field::Time),
            "level" => Some(Field::Level),
            "name" => Some(Field::Name),
            "message" => Some(Field::Message),
            "caller" => Some(Field::Caller),
            "pid" => Some(Field::Pid),
            "thread" => Some(Field::Thread),
            _ => None,
        }
    }
}

#[derive(Clone)]
enum Segment {
    Literal(String),
    Field(Field),
    Call {
        function: String,
        call: FormatFn,
        field: Field,
    },
}

/// Named extension functions available to templates
#[derive(Clone, Default)]
pub struct FormatFunctions {
    functions: HashMap<String, FormatFn>,
}

impl FormatFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions every template can use: `ColorizeLevel`
    pub fn with_defaults() -> Self {
        let mut functions = Self::new();
        functions.insert("ColorizeLevel", |record: &LogRecord, text: &str| {
            Ok(text.color(record.level.color_code()).to_string())
        });
        functions
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&LogRecord, &str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<FormatFn> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn global_functions() -> &'static RwLock<FormatFunctions> {
    static FUNCTIONS: OnceLock<RwLock<FormatFunctions>> = OnceLock::new();
    FUNCTIONS.get_or_init(|| RwLock::new(FormatFunctions::with_defaults()))
}

/// Register a function for templates parsed afterwards (including the one
/// compiled by `setup`). Call before setup.
pub fn set_format_function<F>(name: impl Into<String>, function: F)
where
    F: Fn(&LogRecord, &str) -> std::result::Result<String, String> + Send + Sync + 'static,
{
    global_functions().write().insert(name, function);
}

/// Snapshot of the process-wide function table
pub fn format_functions() -> FormatFunctions {
    global_functions().read().clone()
}

#[derive(Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
    timestamp_format: TimestampFormat,
}

impl Template {
    pub fn parse(source: &str, functions: &FormatFunctions) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(LoggerError::invalid_template(source, "unmatched '}'"));
                }
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(LoggerError::invalid_template(source, "unclosed '{'"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::parse_placeholder(source, &inner, functions)?);
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            timestamp_format: TimestampFormat::default(),
        })
    }

    fn parse_placeholder(source: &str, inner: &str, functions: &FormatFunctions) -> Result<Segment> {
        let parts: Vec<&str> = inner.split_whitespace().collect();
        let field = |name: &str| {
            Field::parse(name).ok_or_else(|| {
                LoggerError::invalid_template(source, format!("unknown field '{}'", name))
            })
        };

        match parts.as_slice() {
            [name] => Ok(Segment::Field(field(name)?)),
            [function, name] => {
                let call = functions.get(function).ok_or_else(|| {
                    LoggerError::invalid_template(source, format!("unknown function '{}'", function))
                })?;
                Ok(Segment::Call {
                    function: function.to_string(),
                    call,
                    field: field(name)?,
                })
            }
            _ => Err(LoggerError::invalid_template(
                source,
                format!("malformed placeholder '{{{}}}'", inner),
            )),
        }
    }

    /// `[timestamp] name LEVEL caller: message`, used for files
    pub fn standard() -> Self {
        Self::builtin("[{timestamp}] {name} {level} {caller}: {message}")
    }

    /// Terminal template with a colorized level
    pub fn color() -> Self {
        Self::builtin("{time} {name} {ColorizeLevel level} {caller}: {message}")
    }

    /// Syslog supplies time and process itself
    pub fn syslog() -> Self {
        Self::builtin("{name} {level} {caller}: {message}")
    }

    fn builtin(source: &str) -> Self {
        match Self::parse(source, &FormatFunctions::with_defaults()) {
            Ok(template) => template,
            Err(e) => unreachable!("built-in template '{}' failed to parse: {}", source, e),
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render one line, without the trailing newline
    pub fn render(&self, record: &LogRecord) -> Result<String> {
        let mut out = String::with_capacity(self.source.len() + record.message.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&self.field_text(*field, record)),
                Segment::Call {
                    function,
                    call,
                    field,
                } => {
                    let text = self.field_text(*field, record);
                    let rendered = call(record, &text)
                        .map_err(|message| LoggerError::formatter(function.as_str(), message))?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    fn field_text(&self, field: Field, record: &LogRecord) -> String {
        match field {
            Field::Timestamp => self.timestamp_format.format(&record.timestamp),
            Field::Time => TimestampFormat::Local.format(&record.timestamp),
            Field::Level => record.level.name().to_string(),
            Field::Name => record.name.clone(),
            Field::Message => record.message.clone(),
            Field::Caller => record
                .caller
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            Field::Pid => std::process::id().to_string(),
            Field::Thread => record.thread_label().to_string(),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("timestamp_format", &self.timestamp_format)
            .finish()
    }
}
