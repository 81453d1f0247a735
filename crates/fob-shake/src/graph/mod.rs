//! In-memory module graph owned by the shaking pass.
//!
//! Modules live in an identifier-keyed map; dependency edges are plain identifiers, so
//! removing a module never leaves a dangling pointer, only a dangling key that
//! [`ModuleGraph::prune_dangling_dependencies`] cleans up.
//!
//! All cross-module count mutations go through the methods in `mutations.rs`.

mod mutations;
mod traversal;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

use crate::Result;
use crate::error::ShakeError;
use crate::module::Module;
use crate::module_id::ModuleId;

/// Identifier-keyed owning map of modules plus the entry point set.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: IndexMap<ModuleId, Module, FxBuildHasher>,
    entry_points: IndexSet<ModuleId, FxBuildHasher>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub(crate) fn module_mut(&mut self, id: &ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    /// Modules in insertion order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &ModuleId> {
        self.entry_points.iter()
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.entry_points.contains(id)
    }

    /// Check the structural invariants the pass relies on.
    pub fn validate(&self) -> Result<()> {
        for (key, module) in &self.modules {
            if key != &module.id {
                return Err(ShakeError::MisplacedModule {
                    key: key.clone(),
                    actual: module.id.clone(),
                });
            }
        }

        if let Some(missing) = self
            .entry_points
            .iter()
            .find(|entry| !self.modules.contains_key(*entry))
        {
            return Err(ShakeError::UnknownEntry(missing.clone()));
        }

        Ok(())
    }

    pub(crate) fn require(&self, id: &ModuleId) -> Result<&Module> {
        self.modules
            .get(id)
            .ok_or_else(|| ShakeError::MissingModule(id.clone()))
    }
}
