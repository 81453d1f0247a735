//! Mutation methods for ModuleGraph.
//!
//! Every change to an export table is paired with the matching change to the contribution
//! ledger of the edge responsible for it, so a target's counts always equal its seeded counts
//! plus the ledgers of its live incoming edges.

use rustc_hash::FxHashSet;

use super::ModuleGraph;
use crate::Result;
use crate::error::ShakeError;
use crate::export_table::ImportUsage;
use crate::module::{Dependency, Module};
use crate::module_id::ModuleId;

impl ModuleGraph {
    /// Add a module into the graph.
    pub fn add_module(&mut self, module: Module) -> Result<()> {
        if self.modules.contains_key(&module.id) {
            return Err(ShakeError::DuplicateModule(module.id));
        }

        if module.is_entry {
            self.entry_points.insert(module.id.clone());
        }

        self.modules.insert(module.id.clone(), module);
        Ok(())
    }

    /// Mark a module as an entry point.
    pub fn add_entry_point(&mut self, id: ModuleId) {
        if let Some(module) = self.modules.get_mut(&id) {
            module.is_entry = true;
        }
        self.entry_points.insert(id);
    }

    fn edge(&self, importer: &ModuleId, specifier: &str) -> Result<&Dependency> {
        self.require(importer)?
            .dependency(specifier)
            .ok_or_else(|| ShakeError::MissingDependency {
                module: importer.clone(),
                specifier: specifier.to_string(),
            })
    }

    /// Add `usage` to the target of `importer`'s edge `specifier` and record it in the edge's
    /// ledger.
    pub(crate) fn contribute(
        &mut self,
        importer: &ModuleId,
        specifier: &str,
        usage: &ImportUsage,
    ) -> Result<()> {
        let target_id = self.edge(importer, specifier)?.target.clone();

        let target = self
            .modules
            .get_mut(&target_id)
            .ok_or_else(|| ShakeError::MissingModule(target_id.clone()))?;
        target
            .exports_mut()
            .add(usage)
            .map_err(|err| ShakeError::count(&target_id, err))?;

        self.ledger_mut(importer, specifier)?
            .absorb(usage)
            .map_err(|err| ShakeError::count(importer, err))
    }

    /// Whether [`ModuleGraph::release`] would succeed for this edge and delta.
    pub(crate) fn can_release(
        &self,
        importer: &ModuleId,
        specifier: &str,
        usage: &ImportUsage,
    ) -> bool {
        let Ok(edge) = self.edge(importer, specifier) else {
            return false;
        };
        let Some(target) = self.modules.get(&edge.target) else {
            return false;
        };
        edge.contribution().covers(usage) && target.exports().can_release(usage)
    }

    /// Give back part of an edge's contribution. Nothing changes if the edge holds less than
    /// `usage`.
    pub(crate) fn release(
        &mut self,
        importer: &ModuleId,
        specifier: &str,
        usage: &ImportUsage,
    ) -> Result<()> {
        let edge = self.edge(importer, specifier)?;
        let target_id = edge.target.clone();
        let mut remaining = edge.contribution().clone();
        remaining
            .subtract(usage)
            .map_err(|err| ShakeError::count(importer, err))?;

        let target = self
            .modules
            .get_mut(&target_id)
            .ok_or_else(|| ShakeError::MissingModule(target_id.clone()))?;
        target
            .exports_mut()
            .release(usage)
            .map_err(|err| ShakeError::count(&target_id, err))?;

        *self.ledger_mut(importer, specifier)? = remaining;
        Ok(())
    }

    /// Remove an edge after returning whatever it still contributes to its target.
    pub(crate) fn drop_dependency(
        &mut self,
        importer: &ModuleId,
        specifier: &str,
    ) -> Result<Option<Dependency>> {
        let Some(edge) = self.require(importer)?.dependency(specifier) else {
            return Ok(None);
        };
        let contribution = edge.contribution().clone();
        if self.modules.contains_key(&edge.target) && !contribution.is_empty() {
            self.release(importer, specifier, &contribution)?;
        }

        Ok(self
            .modules
            .get_mut(importer)
            .and_then(|module| module.dependencies_mut().shift_remove(specifier)))
    }

    /// Delete a module and return its contributions to the targets that still exist.
    ///
    /// Returns the ids of the targets whose counts changed, in dependency order.
    pub(crate) fn remove_module(&mut self, id: &ModuleId) -> Result<Option<Vec<ModuleId>>> {
        let Some(module) = self.modules.shift_remove(id) else {
            return Ok(None);
        };

        let mut touched = Vec::new();
        for dependency in module.dependencies().values() {
            let Some(target) = self.modules.get_mut(&dependency.target) else {
                continue;
            };
            target
                .exports_mut()
                .release(dependency.contribution())
                .map_err(|err| ShakeError::count(&dependency.target, err))?;
            if !touched.contains(&dependency.target) {
                touched.push(dependency.target.clone());
            }
        }

        Ok(Some(touched))
    }

    /// Drop every edge whose target is no longer part of the graph. Returns how many were
    /// dropped.
    pub fn prune_dangling_dependencies(&mut self) -> usize {
        let live: FxHashSet<ModuleId> = self.modules.keys().cloned().collect();
        let mut pruned = 0;
        for module in self.modules.values_mut() {
            let before = module.dependencies().len();
            module
                .dependencies_mut()
                .retain(|_, dependency| live.contains(&dependency.target));
            pruned += before - module.dependencies().len();
        }
        pruned
    }

    fn ledger_mut(&mut self, importer: &ModuleId, specifier: &str) -> Result<&mut ImportUsage> {
        self.modules
            .get_mut(importer)
            .and_then(|module| module.dependencies_mut().get_mut(specifier))
            .map(Dependency::contribution_mut)
            .ok_or_else(|| ShakeError::MissingDependency {
                module: importer.clone(),
                specifier: specifier.to_string(),
            })
    }
}
