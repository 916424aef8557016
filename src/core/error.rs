//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Unknown level name
    #[error("Invalid log level: '{name}'")]
    InvalidLevel { name: String },

    /// Logger name pattern failed to compile
    #[error("Invalid logger name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Format template failed to parse
    #[error("Invalid format template '{template}': {message}")]
    InvalidTemplate { template: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Formatter error with format type
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// Buffered output no longer accepts records
    #[error("Output already stopped")]
    OutputStopped,

    /// Capture child process could not be started
    #[error("Failed to start capture process '{command}': {source}")]
    CaptureSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Standard stream could not be pointed at the capture process
    #[error("Failed to redirect {stream} to capture process: {source}")]
    CaptureRedirect {
        stream: String,
        #[source]
        source: std::io::Error,
    },

    /// Capture is one-shot per process
    #[error("Output capture is already active for this process")]
    CaptureAlreadyActive,
}

impl LoggerError {
    pub fn invalid_level(name: impl Into<String>) -> Self {
        LoggerError::InvalidLevel { name: name.into() }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        LoggerError::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    pub fn invalid_template(template: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidTemplate {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    pub fn capture_spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::CaptureSpawn {
            command: command.into(),
            source,
        }
    }

    pub fn capture_redirect(stream: impl Into<String>, source: std::io::Error) -> Self {
        LoggerError::CaptureRedirect {
            stream: stream.into(),
            source,
        }
    }

    /// True for errors raised while configuring logging (level, pattern,
    /// template or destination)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidLevel { .. }
                | LoggerError::InvalidPattern { .. }
                | LoggerError::InvalidTemplate { .. }
                | LoggerError::InvalidConfiguration { .. }
        )
    }

    pub fn is_capture(&self) -> bool {
        matches!(
            self,
            LoggerError::CaptureSpawn { .. }
                | LoggerError::CaptureRedirect { .. }
                | LoggerError::CaptureAlreadyActive
        )
    }
}
