//! Dead module sweeping.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::Result;
use crate::graph::ModuleGraph;
use crate::ignore::IgnoreFilter;
use crate::module_id::ModuleId;

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Removed modules, in removal order.
    pub removed: Vec<ModuleId>,
    /// Edges dropped because their target no longer exists.
    pub dangling_edges: usize,
}

/// Delete every module nobody references, cascading into its dependencies.
///
/// Seeds the worklist with every exhausted module that is neither ignored nor an entry point,
/// then removes modules one at a time, releasing each removed module's contributions and
/// queueing targets that become exhausted. A module is queued at most once, so cycles
/// terminate. Surviving edges to removed modules are dropped at the end.
pub fn sweep(graph: &mut ModuleGraph, ignore: &dyn IgnoreFilter) -> Result<SweepOutcome> {
    let mut queue: VecDeque<ModuleId> = graph
        .modules()
        .filter(|module| {
            module.exports().is_exhausted() && !is_protected(graph, ignore, &module.id)
        })
        .map(|module| module.id.clone())
        .collect();
    let mut queued: FxHashSet<ModuleId> = queue.iter().cloned().collect();

    let mut outcome = SweepOutcome::default();
    while let Some(id) = queue.pop_front() {
        if !graph.contains(&id) || is_protected(graph, ignore, &id) {
            continue;
        }

        let Some(touched) = graph.remove_module(&id)? else {
            continue;
        };
        tracing::debug!("[fob-shake] removed unreferenced module {}", id);
        outcome.removed.push(id);

        for target in touched {
            let exhausted = graph
                .module(&target)
                .is_some_and(|module| module.exports().is_exhausted());
            if exhausted && !queued.contains(&target) {
                queued.insert(target.clone());
                queue.push_back(target);
            }
        }
    }

    outcome.dangling_edges = graph.prune_dangling_dependencies();
    Ok(outcome)
}

fn is_protected(graph: &ModuleGraph, ignore: &dyn IgnoreFilter, id: &ModuleId) -> bool {
    graph.is_entry(id) || ignore.is_ignored(id)
}
