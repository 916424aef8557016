//! Copy-on-write name rule registries
//!
//! A [`RuleRegistry`] maps logger-name patterns to values (levels or
//! handlers). Readers take a lock-free snapshot of the rule list; writers
//! serialize on a mutex, build a new list and swap it in atomically, so a
//! reader never sees a half-applied change.
//!
//! Resolution: rules are scanned from the most recently installed to the
//! oldest and the first match wins. The default value applies only when
//! no rule matches. Installing a rule whose pattern equals an existing
//! one replaces it and makes it the most recent.

use super::handler::Handler;
use super::log_level::LogLevel;
use super::name_pattern::NamePattern;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registry of level overrides
pub type LevelRegistry = RuleRegistry<LogLevel>;

/// Registry of handler overrides
pub type HandlerRegistry = RuleRegistry<Arc<dyn Handler>>;

/// Pattern-to-value override entry
#[derive(Clone, Debug)]
pub struct NameRule<T> {
    pub pattern: NamePattern,
    pub value: T,
    /// Insertion order; higher is newer
    pub sequence: u64,
}

struct RuleSet<T> {
    default: T,
    rules: Vec<NameRule<T>>,
}

pub struct RuleRegistry<T> {
    current: ArcSwap<RuleSet<T>>,
    next_sequence: Mutex<u64>,
    generation: AtomicU64,
}

impl<T: Clone> RuleRegistry<T> {
    pub fn new(default: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet {
                default,
                rules: Vec::new(),
            }),
            next_sequence: Mutex::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Install a rule. `None` replaces the default rule.
    pub fn set(&self, pattern: Option<NamePattern>, value: T) {
        match pattern {
            Some(pattern) => self.set_rule(pattern, value),
            None => self.set_default(value),
        }
    }

    pub fn set_default(&self, value: T) {
        let _guard = self.next_sequence.lock();
        let snapshot = self.current.load();
        self.publish(RuleSet {
            default: value,
            rules: snapshot.rules.clone(),
        });
    }

    pub fn set_rule(&self, pattern: NamePattern, value: T) {
        let mut next_sequence = self.next_sequence.lock();
        let snapshot = self.current.load();
        let key = pattern.key();

        let mut rules: Vec<NameRule<T>> = snapshot
            .rules
            .iter()
            .filter(|rule| rule.pattern.key() != key)
            .cloned()
            .collect();
        rules.push(NameRule {
            pattern,
            value,
            sequence: *next_sequence,
        });
        *next_sequence += 1;

        self.publish(RuleSet {
            default: snapshot.default.clone(),
            rules,
        });
    }

    /// Remove the rule installed under an equal pattern
    pub fn remove_rule(&self, pattern: &NamePattern) -> bool {
        let _guard = self.next_sequence.lock();
        let snapshot = self.current.load();
        let key = pattern.key();
        if !snapshot.rules.iter().any(|rule| rule.pattern.key() == key) {
            return false;
        }

        let rules = snapshot
            .rules
            .iter()
            .filter(|rule| rule.pattern.key() != key)
            .cloned()
            .collect();
        self.publish(RuleSet {
            default: snapshot.default.clone(),
            rules,
        });
        true
    }

    /// Drop every non-default rule
    pub fn clear_rules(&self) {
        let _guard = self.next_sequence.lock();
        let snapshot = self.current.load();
        self.publish(RuleSet {
            default: snapshot.default.clone(),
            rules: Vec::new(),
        });
    }

    pub fn resolve(&self, name: &str) -> T {
        let snapshot = self.current.load();
        snapshot
            .rules
            .iter()
            .rev()
            .find(|rule| rule.pattern.matches(name))
            .map(|rule| rule.value.clone())
            .unwrap_or_else(|| snapshot.default.clone())
    }

    pub fn default_value(&self) -> T {
        self.current.load().default.clone()
    }

    /// Rules in installation order
    pub fn rules(&self) -> Vec<NameRule<T>> {
        self.current.load().rules.clone()
    }

    /// Bumped after every published change
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn publish(&self, rules: RuleSet<T>) {
        self.current.store(Arc::new(rules));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl LevelRegistry {
    /// Level for a logger of this name
    #[inline]
    pub fn effective_level(&self, name: &str) -> LogLevel {
        self.resolve(name)
    }

    /// Install a regex level rule; `None` sets the base level
    pub fn set_level(&self, pattern: Option<&str>, level: LogLevel) -> super::error::Result<()> {
        match pattern {
            Some(p) if !p.is_empty() => self.set_rule(NamePattern::regex(p)?, level),
            _ => self.set_default(level),
        }
        Ok(())
    }
}
