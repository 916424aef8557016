//! Logger name predicates used by override rules

use super::error::{LoggerError, Result};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether an override rule applies to a logger name
#[derive(Clone)]
pub enum NamePattern {
    /// Name must be identical
    Exact(String),
    /// Name must start with the prefix
    Prefix(String),
    /// Regular expression searched anywhere in the name
    Regex(Regex),
    /// Arbitrary caller-supplied predicate
    Custom {
        label: String,
        predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    },
}

impl NamePattern {
    pub fn exact(name: impl Into<String>) -> Self {
        NamePattern::Exact(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        NamePattern::Prefix(prefix.into())
    }

    /// Compile a regular expression pattern
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(NamePattern::Regex)
            .map_err(|e| LoggerError::invalid_pattern(pattern, e))
    }

    pub fn custom<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        NamePattern::Custom {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(exact) => name == exact,
            NamePattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
            NamePattern::Regex(re) => re.is_match(name),
            NamePattern::Custom { predicate, .. } => predicate(name),
        }
    }

    /// Rules installed with the same key replace one another
    pub(crate) fn key(&self) -> String {
        match self {
            NamePattern::Exact(s) => format!("exact:{}", s),
            NamePattern::Prefix(s) => format!("prefix:{}", s),
            NamePattern::Regex(re) => format!("regex:{}", re.as_str()),
            NamePattern::Custom { label, .. } => format!("custom:{}", label),
        }
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<Regex> for NamePattern {
    fn from(re: Regex) -> Self {
        NamePattern::Regex(re)
    }
}
