//! Log level definitions

use super::error::LoggerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Notice = 3,
    Warn = 4,
    Error = 5,
    Critical = 6,
}

impl LogLevel {
    /// Level a name filter forces matching loggers to; enables everything.
    pub const LOWEST: LogLevel = LogLevel::Trace;

    /// Base level of a freshly initialized registry.
    pub const DEFAULT: LogLevel = LogLevel::Info;

    pub const ALL: [LogLevel; 7] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTICE",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRIT",
        }
    }

    /// POSIX syslog severity for this level
    pub fn syslog_severity(&self) -> libc::c_int {
        match self {
            LogLevel::Trace | LogLevel::Debug => libc::LOG_DEBUG,
            LogLevel::Info => libc::LOG_INFO,
            LogLevel::Notice => libc::LOG_NOTICE,
            LogLevel::Warn => libc::LOG_WARNING,
            LogLevel::Error => libc::LOG_ERR,
            LogLevel::Critical => libc::LOG_CRIT,
        }
    }

    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Trace => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Notice => Cyan,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
            LogLevel::Critical => BrightRed,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            "CRIT" | "CRITICAL" | "FATAL" => Ok(LogLevel::Critical),
            _ => Err(LoggerError::invalid_level(s)),
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => LogLevel::Trace,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Info,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Error => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert!(LogLevel::LOWEST <= LogLevel::Trace);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Crit".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert_eq!("fatal".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_parse_invalid() {
        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLevel { .. }));
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_from_u8_roundtrip() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_u8(level as u8), Some(level));
        }
        assert_eq!(LogLevel::from_u8(200), None);
    }

    #[test]
    fn test_syslog_severity() {
        assert_eq!(LogLevel::Critical.syslog_severity(), libc::LOG_CRIT);
        assert_eq!(LogLevel::Trace.syslog_severity(), libc::LOG_DEBUG);
    }
}
