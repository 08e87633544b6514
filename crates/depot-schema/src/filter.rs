use std::collections::BTreeMap;

use regex::Regex;

use crate::index::IndexEntry;

/// Attributes of an [`IndexEntry`] a filter can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterKey {
    Name,
    Version,
    Arch,
    Distrib,
}

/// A single predicate: either an exact string or a regular expression.
///
/// Plain strings are matched as if they were anchored literals, so
/// `Pattern::literal("all")` does not match `small`. Regex patterns are
/// used as given; callers anchor them themselves when they mean to.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Compile a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == value,
            Self::Regex(re) => re.is_match(value),
        }
    }
}

/// A set of per-attribute predicates, all of which must hold.
///
/// An entry matches when, for every key present, the entry actually has a
/// value for that attribute and the pattern accepts it. A filter on `arch`
/// therefore excludes source packages, whose `arch` is `None`.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    patterns: BTreeMap<FilterKey, Pattern>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: FilterKey, pattern: Pattern) -> Self {
        self.patterns.insert(key, pattern);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        self.patterns.iter().all(|(key, pattern)| {
            let value = match key {
                FilterKey::Name => Some(entry.name.as_str()),
                FilterKey::Version => Some(entry.version.as_str()),
                FilterKey::Arch => entry.arch.as_deref(),
                FilterKey::Distrib => entry.distrib.as_deref(),
            };
            value.is_some_and(|value| pattern.matches(value))
        })
    }
}
