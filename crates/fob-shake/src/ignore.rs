//! Modules the pass must leave alone.
//!
//! Ignored modules are never pruned or swept, but other modules' usage still propagates into
//! them. Typical candidates are runtime glue and helper packages that generated code imports
//! after shaking.

use regex::Regex;

use crate::error::ConfigError;
use crate::module_id::ModuleId;

/// Predicate deciding whether a module is protected from pruning and sweeping.
pub trait IgnoreFilter: Send + Sync {
    fn is_ignored(&self, id: &ModuleId) -> bool;
}

impl<F> IgnoreFilter for F
where
    F: Fn(&ModuleId) -> bool + Send + Sync,
{
    fn is_ignored(&self, id: &ModuleId) -> bool {
        self(id)
    }
}

/// Regex patterns matched against the module path, plus optional custom filters.
#[derive(Default)]
pub struct IgnoreRules {
    patterns: Vec<Regex>,
    filters: Vec<Box<dyn IgnoreFilter>>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `patterns`; any invalid pattern fails the whole set.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            filters: Vec::new(),
        })
    }

    /// Add a custom predicate, consulted after the patterns.
    pub fn with_filter(mut self, filter: impl IgnoreFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.filters.is_empty()
    }
}

impl IgnoreFilter for IgnoreRules {
    fn is_ignored(&self, id: &ModuleId) -> bool {
        let path = id.path_string();
        self.patterns.iter().any(|pattern| pattern.is_match(&path))
            || self.filters.iter().any(|filter| filter.is_ignored(id))
    }
}

impl std::fmt::Debug for IgnoreRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgnoreRules")
            .field(
                "patterns",
                &self.patterns.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .field("filters", &self.filters.len())
            .finish()
    }
}
