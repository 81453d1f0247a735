//! Reference collection: fold every edge's usage into the export table of its target.

use crate::Result;
use crate::export_table::ImportUsage;
use crate::graph::ModuleGraph;
use crate::module::Dependency;

/// Propagate use-site counts across the graph in one importers-first pass.
///
/// For each edge the target receives the edge's default and named counts. Namespace usage
/// references every name the target exports, including names it re-exports through
/// `export *`. `export *` usage is forwarded only for names the importer's own importers
/// asked for and the target can provide; the target records them too, so the next hop of an
/// `export *` chain sees them as forwarded. Whatever is added is recorded in the edge's
/// contribution ledger. Returns the number of edges that contributed.
pub fn collect_exports(graph: &mut ModuleGraph) -> Result<usize> {
    let mut contributed = 0;

    for id in graph.propagation_order() {
        let module = graph.require(&id)?;
        let forwarded = module.forwarded_names();

        let mut pending = Vec::new();
        for (specifier, dependency) in module.dependencies() {
            if !graph.contains(&dependency.target) {
                tracing::debug!(
                    "[fob-shake] {} imports missing module {} via '{}', skipping",
                    id,
                    dependency.target,
                    specifier
                );
                continue;
            }

            let usage = edge_contribution(graph, dependency, &forwarded);
            if !usage.is_empty() {
                pending.push((specifier.clone(), usage));
            }
        }

        for (specifier, usage) in pending {
            graph.contribute(&id, &specifier, &usage)?;
            contributed += 1;
        }
    }

    Ok(contributed)
}

/// What one edge adds to its target.
fn edge_contribution(
    graph: &ModuleGraph,
    dependency: &Dependency,
    forwarded: &[String],
) -> ImportUsage {
    let snapshot = &dependency.usage;
    let mut usage = ImportUsage {
        default: snapshot.default,
        named: snapshot.named.clone(),
        ..ImportUsage::default()
    };
    if snapshot.namespace == 0 && snapshot.all == 0 {
        return usage;
    }

    let provided = graph.exported_names(&dependency.target);

    if snapshot.namespace > 0 {
        usage.all = usage.all.saturating_add(snapshot.namespace);
        for name in &provided {
            usage.add_named(name.clone(), snapshot.namespace);
        }
    }

    if snapshot.all > 0 {
        let shared: Vec<&String> = forwarded
            .iter()
            .filter(|name| provided.contains(name))
            .collect();
        if !shared.is_empty() {
            usage.all = usage.all.saturating_add(snapshot.all);
            for name in shared {
                usage.add_named(name.clone(), 1);
            }
        }
    }

    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::OxcTree;
    use crate::export_table::ExportTable;
    use crate::module::Module;
    use crate::module_id::ModuleId;

    fn id(name: &str) -> ModuleId {
        ModuleId::new_virtual(name)
    }

    fn module(name: &str) -> crate::module::ModuleBuilder {
        Module::builder(id(name), OxcTree::new(format!("{name}.js"), ""))
    }

    #[test]
    fn named_and_default_usage_reach_the_target() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "./lib",
                        Dependency::new(
                            id("lib"),
                            ImportUsage::new().with_default(1).with_named("a", 2),
                        ),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("lib").local_exports(["a", "b"]).build())
            .unwrap();

        assert_eq!(collect_exports(&mut graph).unwrap(), 1);

        let lib = graph.module(&id("lib")).unwrap();
        assert_eq!(lib.exports().default_references(), 1);
        assert_eq!(lib.exports().references("a"), 2);
        assert_eq!(lib.exports().references("b"), 0);

        let edge = graph.module(&id("main")).unwrap().dependency("./lib").unwrap();
        assert_eq!(edge.contribution().named_count("a"), 2);
        assert_eq!(edge.contribution().default, 1);
    }

    #[test]
    fn export_star_forwards_only_requested_names() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "./barrel",
                        Dependency::new(id("barrel"), ImportUsage::new().with_named("x", 1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(
                module("barrel")
                    .dependency(
                        "./impl",
                        Dependency::new(id("impl"), ImportUsage::new().with_all(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("impl").local_exports(["x", "y"]).build())
            .unwrap();

        collect_exports(&mut graph).unwrap();

        let target = graph.module(&id("impl")).unwrap().exports();
        assert_eq!(target.references("x"), 1);
        assert_eq!(target.references("y"), 0);
        assert_eq!(target.all_references(), 1);
    }

    #[test]
    fn export_star_without_overlap_contributes_nothing() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("barrel")
                    .entry(true)
                    .dependency(
                        "./impl",
                        Dependency::new(id("impl"), ImportUsage::new().with_all(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("impl").local_exports(["y"]).build())
            .unwrap();

        assert_eq!(collect_exports(&mut graph).unwrap(), 0);
        assert!(graph.module(&id("impl")).unwrap().exports().is_exhausted());
    }

    #[test]
    fn namespace_usage_references_every_declared_export() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "./lib",
                        Dependency::new(id("lib"), ImportUsage::new().with_namespace(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("lib").local_exports(["a", "b"]).build())
            .unwrap();

        collect_exports(&mut graph).unwrap();

        let lib = graph.module(&id("lib")).unwrap().exports();
        assert_eq!(lib.all_references(), 1);
        assert_eq!(lib.references("a"), 1);
        assert_eq!(lib.references("b"), 1);
    }

    #[test]
    fn missing_targets_are_skipped() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "react",
                        Dependency::new(id("react"), ImportUsage::new().with_default(1)),
                    )
                    .build(),
            )
            .unwrap();

        assert_eq!(collect_exports(&mut graph).unwrap(), 0);
    }

    #[test]
    fn export_star_chains_forward_across_hops() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "./a",
                        Dependency::new(id("a"), ImportUsage::new().with_named("x", 1)),
                    )
                    .build(),
            )
            .unwrap();
        for (from, to) in [("a", "b"), ("b", "c")] {
            graph
                .add_module(
                    module(from)
                        .dependency(
                            format!("./{to}"),
                            Dependency::new(id(to), ImportUsage::new().with_all(1)),
                        )
                        .build(),
                )
                .unwrap();
        }
        graph
            .add_module(module("c").local_exports(["x", "y"]).build())
            .unwrap();

        assert_eq!(collect_exports(&mut graph).unwrap(), 3);

        let b = graph.module(&id("b")).unwrap();
        assert_eq!(b.exports().references("x"), 1);
        assert_eq!(b.forwarded_names(), vec!["x".to_string()]);

        let c = graph.module(&id("c")).unwrap().exports();
        assert_eq!(c.references("x"), 1);
        assert_eq!(c.references("y"), 0);
    }

    #[test]
    fn namespace_usage_reaches_names_behind_export_star() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("main")
                    .entry(true)
                    .dependency(
                        "./barrel",
                        Dependency::new(id("barrel"), ImportUsage::new().with_namespace(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(
                module("barrel")
                    .local_exports(["own"])
                    .dependency(
                        "./impl",
                        Dependency::new(id("impl"), ImportUsage::new().with_all(1)),
                    )
                    .build(),
            )
            .unwrap();
        graph
            .add_module(module("impl").local_exports(["x"]).build())
            .unwrap();

        collect_exports(&mut graph).unwrap();

        let barrel = graph.module(&id("barrel")).unwrap().exports();
        assert_eq!(barrel.all_references(), 1);
        assert_eq!(barrel.references("own"), 1);
        assert_eq!(barrel.references("x"), 1);

        let target = graph.module(&id("impl")).unwrap().exports();
        assert_eq!(target.references("x"), 1);
        assert_eq!(target.all_references(), 1);
    }

    #[test]
    fn seeded_counts_are_kept() {
        let mut graph = ModuleGraph::new();
        graph
            .add_module(
                module("lib")
                    .exports(ExportTable::new().with_named("runtime", 1))
                    .build(),
            )
            .unwrap();
        collect_exports(&mut graph).unwrap();
        assert_eq!(
            graph.module(&id("lib")).unwrap().exports().references("runtime"),
            1
        );
    }
}
