
use crate::{ImportUsage, ModuleGraph};

/// Every module's counts equal the sum of the ledgers of the edges pointing at it.
///
/// Holds for graphs built without seeded counts.
fn assert_counts_match_ledgers(graph: &ModuleGraph) {
    for target in graph.modules() {
        let mut incoming = ImportUsage::default();
        for importer in graph.modules() {
            for dependency in importer.dependencies().values() {
                if dependency.target == target.id {
                    incoming.absorb(dependency.contribution()).unwrap();
                }
            }
        }

        let exports = target.exports();
        assert_eq!(exports.default_references(), incoming.default, "default of {}", target.id);
        assert_eq!(exports.all_references(), incoming.all, "all of {}", target.id);
        for name in exports.names() {
            assert_eq!(
                exports.references(name),
                incoming.named_count(name),
                "`{}` of {}",
                name,
                target.id
            );
        }
    }
}
