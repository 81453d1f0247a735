//! Traversal orders and reachability queries over ModuleGraph.

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet};

use super::ModuleGraph;
use crate::module_id::ModuleId;

impl ModuleGraph {
    /// Importers-first visiting order.
    ///
    /// Reverse post-order of a depth-first walk from the entry points, followed by every module
    /// the walk did not reach, in insertion order. Outside of cycles a module comes after every
    /// module that imports it.
    pub fn propagation_order(&self) -> Vec<ModuleId> {
        let mut visited = vec![false; self.modules.len()];
        let mut postorder = Vec::with_capacity(self.modules.len());

        for entry in &self.entry_points {
            let Some(start) = self.modules.get_index_of(entry) else {
                continue;
            };
            if visited[start] {
                continue;
            }
            visited[start] = true;

            // (module index, next dependency index)
            let mut stack = vec![(start, 0usize)];
            while let Some(&(node, next)) = stack.last() {
                let Some((_, dependency)) = self.modules[node].dependencies().get_index(next)
                else {
                    postorder.push(node);
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if let Some(child) = self.modules.get_index_of(&dependency.target) {
                    if !visited[child] {
                        visited[child] = true;
                        stack.push((child, 0));
                    }
                }
            }
        }

        let unreached = visited
            .iter()
            .enumerate()
            .filter(|(_, seen)| !**seen)
            .map(|(index, _)| index);

        postorder
            .into_iter()
            .rev()
            .chain(unreached)
            .map(|index| self.modules[index].id.clone())
            .collect()
    }

    /// Names `id` can hand out: its own declarations plus everything reachable through its
    /// unaliased `export *` edges, however many hops away. `default` never travels through
    /// `export *`. Cycles and missing targets are tolerated.
    pub fn exported_names(&self, id: &ModuleId) -> Vec<String> {
        let mut names: IndexSet<String, FxBuildHasher> = IndexSet::default();
        let mut visited: FxHashSet<&ModuleId> = FxHashSet::default();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(module) = self.modules.get(current) else {
                continue;
            };
            names.extend(module.local_exports().iter().cloned());
            stack.extend(
                module
                    .dependencies()
                    .values()
                    .filter(|dependency| dependency.usage.all > 0)
                    .map(|dependency| &dependency.target),
            );
        }

        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::OxcTree;
    use crate::export_table::ImportUsage;
    use crate::module::{Dependency, Module, ModuleBuilder};

    fn id(name: &str) -> ModuleId {
        ModuleId::new_virtual(name)
    }

    fn module(name: &str) -> ModuleBuilder {
        Module::builder(id(name), OxcTree::new(format!("{name}.js"), ""))
    }

    fn star(to: &str) -> Dependency {
        Dependency::new(id(to), ImportUsage::new().with_all(1))
    }

    #[test]
    fn importers_come_before_their_dependencies() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(module("main").entry(true).dependency("./a", star("a")).build())
            .unwrap();
        graph
            .add_module(module("b").local_exports(["x"]).build())
            .unwrap();
        graph
            .add_module(module("a").dependency("./b", star("b")).build())
            .unwrap();
        graph.add_module(module("orphan").build()).unwrap();

        assert_eq!(
            graph.propagation_order(),
            vec![id("main"), id("a"), id("b"), id("orphan")]
        );
    }

    #[test]
    fn exported_names_follow_export_star_chains() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("a")
                    .local_exports(["own"])
                    .dependency("./b", star("b"))
                    .dependency(
                        "./ns",
                        Dependency::new(id("ns"), ImportUsage::new().with_namespace(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("b").dependency("./c", star("c")).build())
            .unwrap();
        graph
            .add_module(module("c").local_exports(["x", "default"]).build())
            .unwrap();
        graph
            .add_module(module("ns").local_exports(["hidden"]).build())
            .unwrap();

        let mut names = graph.exported_names(&id("a"));
        names.sort();
        assert_eq!(names, vec!["own".to_string(), "x".to_string()]);
    }

    #[test]
    fn exported_names_survive_cycles_and_missing_targets() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("a")
                    .local_exports(["x"])
                    .dependency("./b", star("b"))
                    .dependency("./gone", star("gone"))
                    .build(),
            )
            .unwrap();
        graph
            .add_module(
                module("b")
                    .local_exports(["y"])
                    .dependency("./a", star("a"))
                    .build(),
            )
            .unwrap();

        let mut names = graph.exported_names(&id("b"));
        names.sort();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }
}
