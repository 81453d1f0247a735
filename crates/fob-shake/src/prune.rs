//! Export pruning.
//!
//! Each module is handled as a small transaction: outline the tree, build an [`EditPlan`] and
//! the count releases it implies without touching anything, check the releases against the
//! graph, apply the plan to the tree and finally commit the releases. A module that fails
//! before the commit is skipped with its tree and counts untouched.

use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::config::TreeShakeConfig;
use crate::editor::{
    BindingInfo, DeclarationSite, EditPlan, ExportDeclKind, ExportStatement, Imported,
    ModuleOutline, Origin, SpecifierSite, TextRange,
};
use crate::error::{EditError, ShakeError, TransformError};
use crate::export_table::ImportUsage;
use crate::graph::ModuleGraph;
use crate::ignore::IgnoreFilter;
use crate::module::{Module, ModuleOutput};
use crate::module_id::ModuleId;
use crate::transform::Transformer;

/// Knobs for [`remove_unused_exports`].
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Also remove local declarations whose every export specifier was removed.
    pub prune_local_declarations: bool,
    /// Import sources of default-interop helpers.
    pub default_helpers: Vec<String>,
    /// Import sources of namespace-interop helpers.
    pub namespace_helpers: Vec<String>,
    /// Maximum number of concurrent transform calls.
    pub transform_concurrency: usize,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self::from(&TreeShakeConfig::default())
    }
}

impl From<&TreeShakeConfig> for PruneOptions {
    fn from(config: &TreeShakeConfig) -> Self {
        Self {
            prune_local_declarations: config.prune_local_declarations,
            default_helpers: config.interop_helpers.default.clone(),
            namespace_helpers: config.interop_helpers.namespace.clone(),
            transform_concurrency: config.transform_concurrency,
        }
    }
}

/// A module the pruner had to leave as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedModule {
    pub id: ModuleId,
    pub reason: String,
}

/// Result of a pruning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Modules whose tree changed, in processing order.
    pub edited: Vec<ModuleId>,
    pub skipped: Vec<SkippedModule>,
    /// Individual statements, declarators and specifiers removed.
    pub removals: usize,
    /// Edges dropped while pruning.
    pub dropped_edges: usize,
}

/// Remove dead exports from every module that is neither ignored nor an entry point, then
/// regenerate the output of every edited module.
pub async fn remove_unused_exports(
    graph: &mut ModuleGraph,
    ignore: &dyn IgnoreFilter,
    transformer: &dyn Transformer,
    options: &PruneOptions,
) -> Result<PruneOutcome> {
    let mut outcome = PruneOutcome::default();

    for id in graph.propagation_order() {
        if ignore.is_ignored(&id) || graph.is_entry(&id) {
            continue;
        }

        match prune_module(graph, &id, options)? {
            ModuleEdit::Unchanged => {}
            ModuleEdit::Edited {
                removals,
                dropped_edges,
                tree_changed,
            } => {
                tracing::debug!(
                    "[fob-shake] pruned {} ({} removals, {} edges dropped)",
                    id,
                    removals,
                    dropped_edges
                );
                outcome.removals += removals;
                outcome.dropped_edges += dropped_edges;
                if tree_changed {
                    outcome.edited.push(id);
                }
            }
            ModuleEdit::Skipped(err) => {
                tracing::warn!("[fob-shake] leaving {} unpruned: {}", id, err);
                outcome.skipped.push(SkippedModule {
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }

    regenerate_outputs(
        graph,
        transformer,
        &outcome.edited,
        options.transform_concurrency,
    )
    .await?;

    Ok(outcome)
}

/// Run the transformer for `ids` with at most `concurrency` calls in flight.
pub(crate) async fn regenerate_outputs(
    graph: &mut ModuleGraph,
    transformer: &dyn Transformer,
    ids: &[ModuleId],
    concurrency: usize,
) -> Result<()> {
    let outputs: Vec<(ModuleId, ModuleOutput)> = {
        let graph = &*graph;
        stream::iter(ids.iter().filter_map(|id| graph.module(id)))
            .map(|module| async move {
                let output = transformer.regenerate(&module.id, module.tree()).await?;
                Ok::<_, TransformError>((module.id.clone(), output))
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?
    };

    for (id, output) in outputs {
        if let Some(module) = graph.module_mut(&id) {
            module.output = Some(output);
        }
    }
    Ok(())
}

enum ModuleEdit {
    Unchanged,
    Edited {
        removals: usize,
        dropped_edges: usize,
        tree_changed: bool,
    },
    Skipped(EditError),
}

/// Everything one module's pruning will do, decided up front.
#[derive(Debug, Default)]
struct ModulePlan {
    edit: EditPlan,
    /// Per dependency specifier, the counts to give back to the target.
    releases: IndexMap<String, ImportUsage>,
    /// Default forwards whose edge goes away if the target ends up unreferenced.
    drop_if_exhausted: Vec<String>,
    /// Interop helper edges no longer needed.
    helper_drops: Vec<String>,
    /// Specifier whose planned release overflowed.
    overflow: Option<String>,
}

impl ModulePlan {
    fn is_empty(&self) -> bool {
        self.edit.is_empty() && self.releases.is_empty() && self.helper_drops.is_empty()
    }
}

fn prune_module(
    graph: &mut ModuleGraph,
    id: &ModuleId,
    options: &PruneOptions,
) -> Result<ModuleEdit> {
    let plan = {
        let module = graph.require(id)?;
        let outline = match module.tree().outline() {
            Ok(outline) => outline,
            Err(err) => return Ok(ModuleEdit::Skipped(err)),
        };
        Planner::new(graph, module, &outline, options).plan()
    };

    if plan.is_empty() {
        return Ok(ModuleEdit::Unchanged);
    }

    if let Some(specifier) = plan.overflow {
        return Ok(ModuleEdit::Skipped(EditError::ReleaseExceedsContribution { specifier }));
    }
    for (specifier, usage) in &plan.releases {
        if !graph.can_release(id, specifier, usage) {
            return Ok(ModuleEdit::Skipped(EditError::ReleaseExceedsContribution {
                specifier: specifier.clone(),
            }));
        }
    }

    let tree_changed = !plan.edit.is_empty();
    if tree_changed {
        let module = graph
            .module_mut(id)
            .ok_or_else(|| ShakeError::MissingModule(id.clone()))?;
        if let Err(err) = module.tree_mut().apply(&plan.edit) {
            return Ok(ModuleEdit::Skipped(err));
        }
    }

    // Commit. From here on a failure means the graph is inconsistent.
    for (specifier, usage) in &plan.releases {
        graph.release(id, specifier, usage)?;
    }

    let mut dropped_edges = 0;
    for specifier in &plan.drop_if_exhausted {
        let exhausted = graph
            .require(id)?
            .dependency(specifier)
            .and_then(|edge| graph.module(&edge.target))
            .is_some_and(|target| target.exports().is_exhausted());
        if exhausted && graph.drop_dependency(id, specifier)?.is_some() {
            dropped_edges += 1;
        }
    }
    for specifier in &plan.helper_drops {
        if graph.drop_dependency(id, specifier)?.is_some() {
            dropped_edges += 1;
        }
    }

    Ok(ModuleEdit::Edited {
        removals: plan.edit.len(),
        dropped_edges,
        tree_changed,
    })
}

/// Pure planning over one module's outline.
struct Planner<'a> {
    graph: &'a ModuleGraph,
    module: &'a Module,
    outline: &'a ModuleOutline,
    options: &'a PruneOptions,
    plan: ModulePlan,
    /// Source ranges of removed declarations; references inside them no longer count.
    removed_ranges: Vec<TextRange>,
    /// An import declaration or default forward went away.
    imports_changed: bool,
    changed: bool,
}

impl<'a> Planner<'a> {
    fn new(
        graph: &'a ModuleGraph,
        module: &'a Module,
        outline: &'a ModuleOutline,
        options: &'a PruneOptions,
    ) -> Self {
        Self {
            graph,
            module,
            outline,
            options,
            plan: ModulePlan::default(),
            removed_ranges: Vec::new(),
            imports_changed: false,
            changed: false,
        }
    }

    fn plan(mut self) -> ModulePlan {
        // Removing one export can free the bindings it referenced, so iterate to a fixpoint.
        let outline = self.outline;
        loop {
            self.changed = false;
            for export in &outline.exports {
                self.visit_export(export);
            }
            for binding in 0..outline.bindings.len() {
                self.release_unexported_binding(binding);
            }
            if !self.changed {
                break;
            }
        }

        if self.imports_changed {
            self.plan.helper_drops = self.unused_helpers();
        }
        self.plan
    }

    fn visit_export(&mut self, export: &ExportStatement) {
        let statement = export.statement;
        if self.plan.edit.is_statement_removed(statement) {
            return;
        }

        match &export.kind {
            ExportDeclKind::Class { binding } | ExportDeclKind::Function { binding } => {
                if self.is_dead_declaration(*binding) {
                    self.remove_statement(statement);
                }
            }
            ExportDeclKind::Variable { declarators } => {
                let total = declarators.len();
                for (index, declarator) in declarators.iter().enumerate() {
                    let Some(binding) = declarator.binding else {
                        continue;
                    };
                    if self.plan.edit.is_declarator_removed(statement, index) {
                        continue;
                    }
                    if self.is_dead_declaration(binding) {
                        self.remove_declarator(statement, index, total, declarator.range);
                    }
                }
            }
            ExportDeclKind::Specifiers {
                source: Some(source),
                specifiers,
            } => {
                let total = specifiers.len();
                for (position, specifier) in specifiers.iter().enumerate() {
                    let site = SpecifierSite {
                        statement,
                        specifier: position,
                    };
                    if self.plan.edit.is_export_specifier_removed(site)
                        || self.external_references(&specifier.exported) > 0
                    {
                        continue;
                    }
                    // Forwards from modules outside the graph are left alone.
                    if self.target_of(source).is_none() {
                        continue;
                    }

                    let delta = if specifier.local == "default" {
                        ImportUsage::new().with_default(1)
                    } else {
                        ImportUsage::new().with_named(specifier.local.clone(), 1)
                    };
                    self.add_release(source, &delta);
                    self.remove_export_specifier(site, total);

                    if specifier.local == "default" {
                        self.plan.drop_if_exhausted.push(source.clone());
                        self.imports_changed = true;
                    }
                }
            }
            ExportDeclKind::Specifiers {
                source: None,
                specifiers,
            } => {
                let total = specifiers.len();
                for (position, specifier) in specifiers.iter().enumerate() {
                    let site = SpecifierSite {
                        statement,
                        specifier: position,
                    };
                    if !self.plan.edit.is_export_specifier_removed(site)
                        && self.external_references(&specifier.exported) == 0
                    {
                        self.remove_export_specifier(site, total);
                    }
                }
            }
            ExportDeclKind::DefaultExpr { binding } => {
                if self.module.exports().default_references() > 0 {
                    return;
                }
                let unused = binding.is_none_or(|binding| {
                    self.live_references(binding) == 0 && !self.exported_elsewhere(binding)
                });
                if unused {
                    self.remove_statement(statement);
                }
            }
            ExportDeclKind::ForwardAll {
                source,
                alias: None,
            } => {
                let forwarded = self.module.forwarded_names();
                let useful = match self.target_of(source) {
                    Some(target) => {
                        let provided = self.graph.exported_names(&target.id);
                        forwarded.iter().any(|name| provided.contains(name))
                    }
                    None => !forwarded.is_empty(),
                };
                if !useful {
                    self.remove_statement(statement);
                }
            }
            ExportDeclKind::ForwardAll {
                source,
                alias: Some(alias),
            } => {
                if self.external_references(alias) > 0 {
                    return;
                }
                let Some(target) = self.target_of(source) else {
                    return;
                };
                let delta = namespace_share(self.graph, &target.id);
                self.add_release(source, &delta);
                self.remove_statement(statement);
            }
        }
    }

    /// Once every export specifier of a binding is gone, give back what the binding holds:
    /// the import it came from, or its local declaration.
    fn release_unexported_binding(&mut self, index: usize) {
        let outline = self.outline;
        let binding = &outline.bindings[index];
        if binding.export_sites.is_empty()
            || self.exported_elsewhere(index)
            || self.live_references(index) > 0
        {
            return;
        }

        match binding.origin {
            Origin::Import {
                statement,
                specifier,
            } => self.release_import(statement, specifier),
            Origin::Declaration(site) if self.options.prune_local_declarations => {
                self.remove_local_declaration(binding, site);
            }
            Origin::Declaration(_) | Origin::Other => {}
        }
    }

    fn release_import(&mut self, statement: usize, specifier: usize) {
        if self.plan.edit.is_import_specifier_removed(statement, specifier) {
            return;
        }
        let outline = self.outline;
        let Some(declaration) = outline.import_at(statement) else {
            return;
        };
        let Some(imported) = declaration.specifiers.get(specifier) else {
            return;
        };
        let Some(target) = self.target_of(&declaration.source) else {
            return;
        };

        let delta = match &imported.imported {
            Imported::Default => ImportUsage::new().with_default(1),
            Imported::Named(name) => ImportUsage::new().with_named(name.clone(), 1),
            Imported::Namespace => namespace_share(self.graph, &target.id),
        };
        self.add_release(&declaration.source, &delta);

        let emptied = self.plan.edit.remove_import_specifier(
            statement,
            specifier,
            declaration.specifiers.len(),
        );
        self.changed = true;
        if emptied {
            self.imports_changed = true;
        }
    }

    fn remove_local_declaration(&mut self, binding: &BindingInfo, site: DeclarationSite) {
        if self.plan.edit.is_declaration_removed(site) {
            return;
        }
        let statement = match site {
            DeclarationSite::Statement { statement } => statement,
            DeclarationSite::Declarator { statement, .. } => statement,
        };
        // Exported declarations are governed by their own export name.
        if self
            .outline
            .exports
            .iter()
            .any(|export| export.statement == statement)
        {
            return;
        }

        match site {
            DeclarationSite::Statement { statement } => self.remove_statement(statement),
            DeclarationSite::Declarator {
                statement,
                index,
                total,
            } => {
                let range = binding
                    .declaration
                    .unwrap_or_else(|| self.outline.statements[statement]);
                self.remove_declarator(statement, index, total, range);
            }
        }
    }

    /// An exported class, function or variable nobody outside or inside uses.
    fn is_dead_declaration(&self, binding: usize) -> bool {
        let name = &self.outline.bindings[binding].name;
        self.external_references(name) == 0
            && self.live_references(binding) == 0
            && !self.exported_elsewhere(binding)
    }

    /// References other modules hold on an exported name.
    fn external_references(&self, exported: &str) -> u32 {
        let exports = self.module.exports();
        if exported == "default" {
            exports.default_references()
        } else {
            exports.references(exported)
        }
    }

    fn live_references(&self, binding: usize) -> usize {
        self.outline.bindings[binding]
            .references
            .iter()
            .filter(|offset| {
                !self
                    .removed_ranges
                    .iter()
                    .any(|range| range.contains(**offset))
            })
            .count()
    }

    fn exported_elsewhere(&self, binding: usize) -> bool {
        self.outline.bindings[binding]
            .export_sites
            .iter()
            .any(|site| !self.plan.edit.is_export_specifier_removed(*site))
    }

    fn target_of(&self, specifier: &str) -> Option<&'a Module> {
        let (graph, module) = (self.graph, self.module);
        let edge = module.dependency(specifier)?;
        graph.module(&edge.target)
    }

    fn add_release(&mut self, specifier: &str, delta: &ImportUsage) {
        let entry = self.plan.releases.entry(specifier.to_string()).or_default();
        if entry.absorb(delta).is_err() {
            self.plan.overflow = Some(specifier.to_string());
        }
    }

    fn remove_statement(&mut self, statement: usize) {
        if self.plan.edit.remove_statement(statement) {
            self.removed_ranges.push(self.outline.statements[statement]);
            if self.outline.import_at(statement).is_some() {
                self.imports_changed = true;
            }
            self.changed = true;
        }
    }

    fn remove_declarator(
        &mut self,
        statement: usize,
        index: usize,
        total: usize,
        range: TextRange,
    ) {
        self.plan.edit.remove_declarator(statement, index, total);
        self.removed_ranges.push(range);
        self.changed = true;
    }

    fn remove_export_specifier(&mut self, site: SpecifierSite, total: usize) {
        self.plan
            .edit
            .remove_export_specifier(site.statement, site.specifier, total);
        self.changed = true;
    }

    /// Helper edges whose import style no longer occurs in the module.
    fn unused_helpers(&self) -> Vec<String> {
        let edit = &self.plan.edit;
        let mut has_default = false;
        let mut has_namespace = false;
        let mut remaining_sources = Vec::new();

        for declaration in &self.outline.imports {
            if edit.is_statement_removed(declaration.statement) {
                continue;
            }
            remaining_sources.push(declaration.source.as_str());
            for (position, specifier) in declaration.specifiers.iter().enumerate() {
                if edit.is_import_specifier_removed(declaration.statement, position) {
                    continue;
                }
                match specifier.imported {
                    Imported::Default => has_default = true,
                    Imported::Namespace => has_namespace = true,
                    Imported::Named(_) => {}
                }
            }
        }

        let mut helpers = Vec::new();
        if !has_default {
            helpers.extend(self.options.default_helpers.iter());
        }
        if !has_default && !has_namespace {
            helpers.extend(self.options.namespace_helpers.iter());
        }

        helpers
            .into_iter()
            .filter(|helper| {
                self.module.dependency(helper).is_some()
                    && !remaining_sources.contains(&helper.as_str())
            })
            .cloned()
            .collect()
    }
}

/// One namespace use of `target`: its wildcard counter plus every name it exports.
fn namespace_share(graph: &ModuleGraph, target: &ModuleId) -> ImportUsage {
    let mut usage = ImportUsage::new().with_all(1);
    for name in graph.exported_names(target) {
        usage.add_named(name, 1);
    }
    usage
}
