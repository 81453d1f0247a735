//! Build a [`ModuleGraph`] straight from module sources.
//!
//! Relative specifiers resolve against the importing file; bare specifiers are external and
//! produce no edge. This is enough to drive the passes from tests and small tools without a
//! bundler in front.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use path_clean::PathClean;

use crate::Result;
use crate::editor::OxcTree;
use crate::error::ShakeError;
use crate::graph::ModuleGraph;
use crate::module::{Dependency, Module};
use crate::module_id::ModuleId;

/// Extensions tried, in order, for extensionless relative specifiers.
pub const EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "ts", "tsx"];

/// Collects module sources and entry points, then scans them into a graph.
#[derive(Debug, Default)]
pub struct SourceGraphLoader {
    sources: IndexMap<PathBuf, String>,
    entries: IndexSet<PathBuf>,
}

impl SourceGraphLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. A later source for the same path replaces the earlier one.
    pub fn source(mut self, path: impl AsRef<Path>, code: impl Into<String>) -> Self {
        self.add_source(path, code);
        self
    }

    /// Register a module as an entry point.
    pub fn entry(mut self, path: impl AsRef<Path>, code: impl Into<String>) -> Self {
        self.entries.insert(path.as_ref().clean());
        self.add_source(path, code);
        self
    }

    pub fn add_source(&mut self, path: impl AsRef<Path>, code: impl Into<String>) {
        self.sources.insert(path.as_ref().clean(), code.into());
    }

    /// Read a module from disk.
    pub fn add_file(&mut self, path: impl AsRef<Path>, is_entry: bool) -> Result<()> {
        let path = path.as_ref().clean();
        let code = std::fs::read_to_string(&path).map_err(|source| ShakeError::Io {
            path: path.clone(),
            source,
        })?;
        if is_entry {
            self.entries.insert(path.clone());
        }
        self.sources.insert(path, code);
        Ok(())
    }

    /// Scan every source and link the edges.
    pub fn build(self) -> Result<ModuleGraph> {
        let mut ids: IndexMap<&Path, ModuleId> = IndexMap::with_capacity(self.sources.len());
        for path in self.sources.keys() {
            ids.insert(path.as_path(), ModuleId::new(path)?);
        }

        let mut graph = ModuleGraph::new();
        for (path, code) in &self.sources {
            let id = ids[path.as_path()].clone();
            let tree = OxcTree::new(path.clone(), code.clone());
            let facts = tree.facts().map_err(|source| ShakeError::Edit {
                module: id.clone(),
                source,
            })?;

            let mut builder = Module::builder(id.clone(), tree)
                .local_exports(facts.local_exports)
                .entry(self.entries.contains(path));

            for (specifier, usage) in facts.dependencies {
                let Some(resolved) = self.resolve(path, &specifier) else {
                    tracing::debug!("[fob-shake] {} treats '{}' as external", id, specifier);
                    continue;
                };
                let target = ids[resolved.as_path()].clone();
                builder = builder.dependency(specifier, Dependency::new(target, usage));
            }

            graph.add_module(builder.build())?;
        }

        tracing::debug!(
            "[fob-shake] loaded {} modules ({} entries)",
            graph.len(),
            self.entries.len()
        );
        Ok(graph)
    }

    /// Resolve `specifier` as imported from `importer` to a registered source path.
    fn resolve(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        if !is_relative(specifier) {
            return None;
        }

        let base = importer.parent().unwrap_or_else(|| Path::new(""));
        let candidate = base.join(specifier).clean();
        if self.sources.contains_key(&candidate) {
            return Some(candidate);
        }

        let with_extension = EXTENSIONS.iter().map(|ext| {
            let mut path = candidate.clone().into_os_string();
            path.push(format!(".{ext}"));
            PathBuf::from(path)
        });
        let index = EXTENSIONS
            .iter()
            .map(|ext| candidate.join(format!("index.{ext}")));

        with_extension
            .chain(index)
            .find(|path| self.sources.contains_key(path))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}
