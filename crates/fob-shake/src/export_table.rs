//! Reference counters shared between modules.
//!
//! An [`ExportTable`] records how many external references exist to a module's default,
//! wildcard and named exports. An [`ImportUsage`] describes how one dependency edge uses its
//! target; the same type doubles as the per-edge contribution ledger and as the delta passed
//! to the graph's count mutation API.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Counter arithmetic failure.
///
/// Counters are unsigned, so a subtraction that would go below zero means the tree edits and
/// the reference counts disagree. That is a contract violation, never a transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("counter `{counter}` would drop below zero (has {available}, releasing {requested})")]
    Underflow {
        counter: String,
        available: u32,
        requested: u32,
    },

    #[error("counter `{counter}` overflowed")]
    Overflow { counter: String },
}

/// How an importing module uses one target module.
///
/// Built by the parser as a snapshot (one per dependency edge) and reused for ledgers and
/// release deltas. Zero counts are never stored in `named`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportUsage {
    /// `import x from` / `export { default } from`
    #[serde(default)]
    pub default: u32,
    /// `export * from`
    #[serde(default)]
    pub all: u32,
    /// `import * as ns from`, `export * as ns from`, dynamic `import()`
    #[serde(default)]
    pub namespace: u32,
    /// `import { a } from` / `export { a } from`
    #[serde(default)]
    pub named: IndexMap<String, u32>,
}

impl ImportUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, count: u32) -> Self {
        self.default += count;
        self
    }

    pub fn with_all(mut self, count: u32) -> Self {
        self.all += count;
        self
    }

    pub fn with_namespace(mut self, count: u32) -> Self {
        self.namespace += count;
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, count: u32) -> Self {
        self.add_named(name, count);
        self
    }

    /// Add `count` references to `name`. A zero count is a no-op.
    pub fn add_named(&mut self, name: impl Into<String>, count: u32) {
        if count == 0 {
            return;
        }
        *self.named.entry(name.into()).or_insert(0) += count;
    }

    pub fn named_count(&self, name: &str) -> u32 {
        self.named.get(name).copied().unwrap_or(0)
    }

    /// True when the usage carries no reference at all (e.g. `import './polyfill'`).
    pub fn is_empty(&self) -> bool {
        self.default == 0 && self.all == 0 && self.namespace == 0 && self.named_total() == 0
    }

    fn named_total(&self) -> u64 {
        self.named.values().map(|&count| u64::from(count)).sum()
    }

    /// Accumulate `other` into this usage. Either every counter is updated or none is.
    pub(crate) fn absorb(&mut self, other: &ImportUsage) -> Result<(), CountError> {
        checked_add("default", self.default, other.default)?;
        checked_add("all", self.all, other.all)?;
        checked_add("namespace", self.namespace, other.namespace)?;
        for (name, &count) in &other.named {
            checked_add(name, self.named_count(name), count)?;
        }

        self.default += other.default;
        self.all += other.all;
        self.namespace += other.namespace;
        for (name, &count) in &other.named {
            self.add_named(name.clone(), count);
        }
        Ok(())
    }

    /// True if subtracting `delta` would succeed.
    pub(crate) fn covers(&self, delta: &ImportUsage) -> bool {
        self.default >= delta.default
            && self.all >= delta.all
            && self.namespace >= delta.namespace
            && delta
                .named
                .iter()
                .all(|(name, &count)| self.named_count(name) >= count)
    }

    /// Remove `delta` from this usage, failing without side effects if any counter would go
    /// negative. Named entries that reach zero are dropped.
    pub(crate) fn subtract(&mut self, delta: &ImportUsage) -> Result<(), CountError> {
        checked_sub("default", self.default, delta.default)?;
        checked_sub("all", self.all, delta.all)?;
        checked_sub("namespace", self.namespace, delta.namespace)?;
        for (name, &count) in &delta.named {
            checked_sub(name, self.named_count(name), count)?;
        }

        self.default -= delta.default;
        self.all -= delta.all;
        self.namespace -= delta.namespace;
        for (name, &count) in &delta.named {
            if let Some(entry) = self.named.get_mut(name) {
                *entry -= count;
                if *entry == 0 {
                    self.named.shift_remove(name);
                }
            }
        }
        Ok(())
    }
}

/// Per-module record of external references to its exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    #[serde(default)]
    default: u32,
    #[serde(default)]
    all: u32,
    #[serde(default)]
    named: IndexMap<String, u32>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the default counter. Used by parsers that pre-populate tables.
    pub fn with_default(mut self, references: u32) -> Self {
        self.default = references;
        self
    }

    /// Seed the wildcard counter.
    pub fn with_all(mut self, references: u32) -> Self {
        self.all = references;
        self
    }

    /// Seed a named counter.
    pub fn with_named(mut self, name: impl Into<String>, references: u32) -> Self {
        self.named.insert(name.into(), references);
        self
    }

    pub fn default_references(&self) -> u32 {
        self.default
    }

    pub fn all_references(&self) -> u32 {
        self.all
    }

    /// References to a named export; absent names have zero references.
    pub fn references(&self, name: &str) -> u32 {
        self.named.get(name).copied().unwrap_or(0)
    }

    /// True if `name` has an entry, even one that dropped back to zero.
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Names with an entry, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// A module whose table is exhausted is not referenced by anyone and may be swept.
    pub fn is_exhausted(&self) -> bool {
        self.default == 0 && self.all == 0 && self.named.values().all(|&count| count == 0)
    }

    /// Add a contribution. Either every counter is updated or none is.
    pub(crate) fn add(&mut self, usage: &ImportUsage) -> Result<(), CountError> {
        checked_add("default", self.default, usage.default)?;
        checked_add("all", self.all, usage.all)?;
        for (name, &count) in &usage.named {
            checked_add(name, self.references(name), count)?;
        }

        self.default += usage.default;
        self.all += usage.all;
        for (name, &count) in &usage.named {
            *self.named.entry(name.clone()).or_insert(0) += count;
        }
        Ok(())
    }

    /// True if releasing `usage` would succeed.
    pub(crate) fn can_release(&self, usage: &ImportUsage) -> bool {
        self.default >= usage.default
            && self.all >= usage.all
            && usage
                .named
                .iter()
                .all(|(name, &count)| self.references(name) >= count)
    }

    /// Remove a contribution previously added with [`ExportTable::add`].
    ///
    /// Entries that drop to zero are kept: a zero entry still marks a name that was once
    /// forwarded through this module.
    pub(crate) fn release(&mut self, usage: &ImportUsage) -> Result<(), CountError> {
        checked_sub("default", self.default, usage.default)?;
        checked_sub("all", self.all, usage.all)?;
        for (name, &count) in &usage.named {
            checked_sub(name, self.references(name), count)?;
        }

        self.default -= usage.default;
        self.all -= usage.all;
        for (name, &count) in &usage.named {
            if let Some(entry) = self.named.get_mut(name) {
                *entry -= count;
            }
        }
        Ok(())
    }
}

fn checked_add(counter: &str, current: u32, count: u32) -> Result<u32, CountError> {
    current.checked_add(count).ok_or_else(|| CountError::Overflow {
        counter: counter.to_string(),
    })
}

fn checked_sub(counter: &str, available: u32, requested: u32) -> Result<u32, CountError> {
    available
        .checked_sub(requested)
        .ok_or_else(|| CountError::Underflow {
            counter: counter.to_string(),
            available,
            requested,
        })
}
