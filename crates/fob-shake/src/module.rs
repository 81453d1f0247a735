use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::editor::SyntaxTree;
use crate::export_table::{ExportTable, ImportUsage};
use crate::module_id::ModuleId;

/// One import source of a module, resolved to a module in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub target: ModuleId,
    /// How the importer uses the target, as recorded at parse time.
    pub usage: ImportUsage,
    /// What this edge actually added to the target's export table.
    #[serde(default)]
    contribution: ImportUsage,
}

impl Dependency {
    pub fn new(target: ModuleId, usage: ImportUsage) -> Self {
        Self {
            target,
            usage,
            contribution: ImportUsage::default(),
        }
    }

    /// Counts currently held on the target by this edge.
    pub fn contribution(&self) -> &ImportUsage {
        &self.contribution
    }

    pub(crate) fn contribution_mut(&mut self) -> &mut ImportUsage {
        &mut self.contribution
    }
}

/// Compiled output produced by a [`crate::Transformer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutput {
    pub code: String,
    pub line_count: usize,
    /// JSON source map, when the transformer produced one.
    pub map: Option<String>,
}

impl ModuleOutput {
    pub fn from_code(code: impl Into<String>) -> Self {
        let code = code.into();
        let line_count = code.lines().count();
        Self {
            code,
            line_count,
            map: None,
        }
    }
}

/// A module of the graph together with its owned syntax tree.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    tree: Box<dyn SyntaxTree>,
    /// Names the module exports itself (including re-exports), excluding `default`.
    local_exports: Vec<String>,
    exports: ExportTable,
    dependencies: IndexMap<String, Dependency>,
    pub output: Option<ModuleOutput>,
    pub is_entry: bool,
}

impl Module {
    /// Create a new module builder with sensible defaults.
    pub fn builder(id: ModuleId, tree: impl SyntaxTree + 'static) -> ModuleBuilder {
        ModuleBuilder {
            module: Self {
                id,
                tree: Box::new(tree),
                local_exports: Vec::new(),
                exports: ExportTable::default(),
                dependencies: IndexMap::new(),
                output: None,
                is_entry: false,
            },
        }
    }

    pub fn tree(&self) -> &dyn SyntaxTree {
        self.tree.as_ref()
    }

    pub(crate) fn tree_mut(&mut self) -> &mut dyn SyntaxTree {
        self.tree.as_mut()
    }

    pub fn local_exports(&self) -> &[String] {
        &self.local_exports
    }

    pub fn declares_export(&self, name: &str) -> bool {
        self.local_exports.iter().any(|local| local == name)
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub(crate) fn exports_mut(&mut self) -> &mut ExportTable {
        &mut self.exports
    }

    /// Names that appear in the export table without being declared here: the names other
    /// modules expect this module to forward through `export *`.
    pub fn forwarded_names(&self) -> Vec<String> {
        self.exports
            .names()
            .filter(|name| !self.declares_export(name))
            .map(str::to_string)
            .collect()
    }

    pub fn dependencies(&self) -> &IndexMap<String, Dependency> {
        &self.dependencies
    }

    pub fn dependency(&self, specifier: &str) -> Option<&Dependency> {
        self.dependencies.get(specifier)
    }

    pub(crate) fn dependencies_mut(&mut self) -> &mut IndexMap<String, Dependency> {
        &mut self.dependencies
    }
}

/// Builder for `Module` to avoid long argument lists in constructors.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn local_exports<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if name != "default" && !self.module.declares_export(&name) {
                self.module.local_exports.push(name);
            }
        }
        self
    }

    /// Seed the export table, e.g. with counts known to the parser.
    pub fn exports(mut self, exports: ExportTable) -> Self {
        self.module.exports = exports;
        self
    }

    pub fn dependency(mut self, specifier: impl Into<String>, dependency: Dependency) -> Self {
        self.module
            .dependencies
            .insert(specifier.into(), dependency);
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.module.is_entry = is_entry;
        self
    }

    pub fn output(mut self, output: ModuleOutput) -> Self {
        self.module.output = Some(output);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::OxcTree;

    fn id(name: &str) -> ModuleId {
        ModuleId::new_virtual(name)
    }

    #[test]
    fn builder_dedupes_local_exports_and_skips_default() {
        let module = Module::builder(id("a"), OxcTree::new("a.js", ""))
            .local_exports(["x", "default", "y", "x"])
            .build();
        assert_eq!(module.local_exports(), ["x", "y"]);
        assert!(module.declares_export("y"));
        assert!(!module.declares_export("default"));
    }

    #[test]
    fn forwarded_names_exclude_local_exports() {
        let module = Module::builder(id("a"), OxcTree::new("a.js", ""))
            .local_exports(["own"])
            .exports(
                ExportTable::new()
                    .with_named("own", 1)
                    .with_named("elsewhere", 1),
            )
            .build();
        assert_eq!(module.forwarded_names(), vec!["elsewhere".to_string()]);
    }

    #[test]
    fn new_dependencies_hold_no_contribution() {
        let dependency = Dependency::new(id("b"), ImportUsage::new().with_default(1));
        assert!(dependency.contribution().is_empty());
        assert_eq!(dependency.usage.default, 1);
    }

    #[test]
    fn output_counts_lines() {
        let output = ModuleOutput::from_code("a();\nb();\n");
        assert_eq!(output.line_count, 2);
        assert!(output.map.is_none());
    }
}
