//! One-call process setup from a [`LogConfig`]
//!
//! `setup` configures the process-wide registry: optional capture of
//! stdout/stderr into a collector process, base level, filter, output,
//! template, optional buffering, default handler and the `log` crate
//! bridge. Everything that can be checked without side effects is
//! checked first, and the registry is only touched once every fallible
//! step has succeeded, so a failed setup leaves logging as it was.

use crate::appenders::{BufferedOutput, Facility, SyslogOutput, WriterOutput};
use crate::capture;
use crate::core::bridge::install_std_log_bridge;
use crate::core::log_registry::{self, LogRegistry};
use crate::core::template::format_functions;
use crate::core::{
    LogLevel, LoggerError, NamePattern, OverflowPolicy, Result, Template, TextHandler, TextOutput,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::Arc;

/// Logger name used by the `log` crate bridge
pub const STD_LOG_LOGGER: &str = "stdlog";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `stderr`, `stdout`, `syslog`, or a file path
    pub output: String,
    /// Base level name
    pub level: String,
    /// Regex of logger names forced to the lowest level
    pub filter: Option<String>,
    /// Template source; the output's built-in template when unset
    pub format: Option<String>,
    /// Level of records arriving through the `log` crate
    pub stdlog_level: String,
    /// Collector command for stdout/stderr capture, usually `/usr/bin/logger`
    pub subproc: Option<String>,
    /// Queue capacity in records; 0 writes synchronously
    pub buffer: usize,
    pub overflow_policy: OverflowPolicy,
    pub facility: Facility,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: "stderr".to_string(),
            level: LogLevel::DEFAULT.to_string(),
            filter: None,
            format: None,
            stdlog_level: LogLevel::Warn.to_string(),
            subproc: None,
            buffer: 0,
            overflow_policy: OverflowPolicy::default(),
            facility: Facility::default(),
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `LOG_OUTPUT`, `LOG_LEVEL`, `LOG_FILTER`,
    /// `LOG_FORMAT`, `LOG_STDLEVEL`, `LOG_SUBPROC` and `LOG_BUFFER`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(output) = non_empty("LOG_OUTPUT") {
            config.output = output;
        }
        if let Some(level) = non_empty("LOG_LEVEL") {
            config.level = level;
        }
        config.filter = non_empty("LOG_FILTER");
        config.format = non_empty("LOG_FORMAT");
        if let Some(level) = non_empty("LOG_STDLEVEL") {
            config.stdlog_level = level;
        }
        config.subproc = non_empty("LOG_SUBPROC");
        if let Some(buffer) = non_empty("LOG_BUFFER") {
            config.buffer = buffer.trim().parse().map_err(|_| {
                LoggerError::config("LOG_BUFFER", format!("'{}' is not a record count", buffer))
            })?;
        }
        Ok(config)
    }
}

/// Everything in a config that can be checked without side effects
struct Validated {
    level: LogLevel,
    filter: Option<NamePattern>,
    template: Option<Template>,
    stdlog_level: LogLevel,
    capture: Option<Command>,
}

fn validate(procname: &str, facility: Facility, config: &LogConfig) -> Result<Validated> {
    let level: LogLevel = config.level.parse()?;
    let stdlog_level: LogLevel = config.stdlog_level.parse()?;

    let filter = match config.filter.as_deref().filter(|f| !f.is_empty()) {
        Some(source) => Some(NamePattern::regex(source)?),
        None => None,
    };

    let template = match config.format.as_deref().filter(|f| !f.is_empty()) {
        Some(source) => Some(Template::parse(source, &format_functions())?),
        None => None,
    };

    let capture = match config.subproc.as_deref() {
        Some(subproc) => Some(collector_command(subproc, procname, facility)?),
        None => None,
    };

    Ok(Validated {
        level,
        filter,
        template,
        stdlog_level,
        capture,
    })
}

/// `<subproc> --tag <procname> --priority <facility>.crit` in its own
/// process group, so a terminal interrupt does not reach it before us
fn collector_command(subproc: &str, procname: &str, facility: Facility) -> Result<Command> {
    let mut parts = subproc.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| LoggerError::config("subproc", "empty capture command"))?;

    let mut command = Command::new(program);
    command
        .args(parts)
        .args(["--tag", procname, "--priority"])
        .arg(format!("{}.crit", facility.name()))
        .process_group(0);
    Ok(command)
}

/// Output and its default template for `config.output`
fn build_output(
    procname: &str,
    facility: Facility,
    output: &str,
) -> Result<(Arc<dyn TextOutput>, Template)> {
    let built: (Arc<dyn TextOutput>, Template) = match output.to_lowercase().as_str() {
        "syslog" => (
            Arc::new(SyslogOutput::new(procname, facility)?),
            Template::syslog(),
        ),
        "stdout" => (Arc::new(WriterOutput::stdout()), Template::color()),
        "stderr" => (Arc::new(WriterOutput::stderr()), Template::color()),
        _ => (Arc::new(WriterOutput::file(output)?), Template::standard()),
    };
    Ok(built)
}

fn configure(
    registry: &LogRegistry,
    procname: &str,
    facility: Facility,
    config: &LogConfig,
) -> Result<()> {
    let validated = validate(procname, facility, config)?;

    if let Some(command) = validated.capture {
        capture::capture_command(command)?;
    }

    let (output, default_template) = build_output(procname, facility, &config.output)?;
    let template = validated.template.unwrap_or(default_template);

    let buffered = (config.buffer > 0).then(|| {
        Arc::new(
            BufferedOutput::builder(Arc::clone(&output))
                .capacity(config.buffer)
                .overflow_policy(config.overflow_policy)
                .build(),
        )
    });

    // Last fallible step; nothing in the registry has changed yet
    install_std_log_bridge(
        registry.get_logger_named(STD_LOG_LOGGER),
        validated.stdlog_level,
    )?;

    let output: Arc<dyn TextOutput> = match buffered {
        Some(buffered) => {
            registry.register_output(Arc::clone(&buffered));
            buffered
        }
        None => output,
    };

    registry.levels().set_default(validated.level);
    if let Some(filter) = validated.filter {
        registry.set_level(Some(filter), LogLevel::LOWEST);
    }
    registry.set_handler(None, Arc::new(TextHandler::new(template, output)));
    Ok(())
}

/// Configure process-wide logging with the `user` syslog facility
pub fn setup(procname: &str, config: &LogConfig) -> Result<()> {
    setup_with_facility(procname, config.facility, config)
}

pub fn setup_with_facility(procname: &str, facility: Facility, config: &LogConfig) -> Result<()> {
    configure(log_registry::global(), procname, facility, config)
}

/// [`setup`], panicking on error
pub fn must_setup(procname: &str, config: &LogConfig) {
    if let Err(e) = setup(procname, config) {
        panic!("logging setup for '{}' failed: {}", procname, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NullHandler;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.output, "stderr");
        assert_eq!(config.level, "INFO");
        assert_eq!(config.stdlog_level, "WARN");
        assert_eq!(config.buffer, 0);
        assert_eq!(config.overflow_policy, OverflowPolicy::Block);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = LogConfig::from_lookup(lookup(&[
            ("LOG_OUTPUT", "/tmp/app.log"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FILTER", "^db"),
            ("LOG_BUFFER", "128"),
            ("LOG_SUBPROC", ""),
        ]))
        .unwrap();

        assert_eq!(config.output, "/tmp/app.log");
        assert_eq!(config.level, "debug");
        assert_eq!(config.filter.as_deref(), Some("^db"));
        assert_eq!(config.buffer, 128);
        assert_eq!(config.subproc, None);
    }

    #[test]
    fn test_bad_buffer_is_rejected() {
        let err = LogConfig::from_lookup(lookup(&[("LOG_BUFFER", "lots")])).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level": "warn", "overflow_policy": "drop_newest"}"#).unwrap();
        assert_eq!(config.level, "warn");
        assert_eq!(config.output, "stderr");
        assert_eq!(config.overflow_policy, OverflowPolicy::DropNewest);
    }

    #[test]
    fn test_invalid_config_changes_nothing() {
        let registry = LogRegistry::new(LogLevel::Info, Arc::new(NullHandler));
        let config = LogConfig {
            level: "debug".into(),
            filter: Some("(unclosed".into()),
            ..LogConfig::default()
        };

        assert!(configure(&registry, "app", Facility::User, &config).is_err());
        assert_eq!(registry.levels().default_value(), LogLevel::Info);
        assert!(registry.levels().rules().is_empty());
    }

    #[test]
    fn test_invalid_level_name_is_rejected() {
        let config = LogConfig {
            level: "loud".into(),
            ..LogConfig::default()
        };
        assert!(validate("app", Facility::User, &config).is_err());
    }

    #[test]
    fn test_unknown_template_function_is_rejected() {
        let config = LogConfig {
            format: Some("{Shout message}".into()),
            ..LogConfig::default()
        };
        assert!(validate("app", Facility::User, &config).is_err());
    }

    #[test]
    fn test_collector_arguments() {
        let command = collector_command("/usr/bin/logger -s", "myapp", Facility::Local3).unwrap();
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "/usr/bin/logger");
        assert_eq!(args, ["-s", "--tag", "myapp", "--priority", "local3.crit"]);
        assert!(collector_command("  ", "myapp", Facility::User).is_err());
    }

    #[test]
    fn test_configure_file_output_with_buffer() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("setup.log");
        let registry = LogRegistry::new(LogLevel::Info, Arc::new(NullHandler));
        let config = LogConfig {
            output: path.to_string_lossy().into_owned(),
            level: "notice".into(),
            filter: Some("^setup\\.db".into()),
            buffer: 16,
            ..LogConfig::default()
        };

        configure(&registry, "app", Facility::User, &config).unwrap();

        let db = registry.get_logger_named("setup.db");
        let web = registry.get_logger_named("setup.web");
        db.trace("pool opened");
        web.info("suppressed");
        web.notice("listening");

        let report = registry.shutdown(Duration::from_secs(5));
        assert_eq!(report.delivered, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("setup.db TRACE"));
        assert!(contents.contains("pool opened"));
        assert!(contents.contains("setup.web NOTICE"));
        assert!(!contents.contains("suppressed"));
    }
}
