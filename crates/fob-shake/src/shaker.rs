//! The tree shaking driver.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::collect::collect_exports;
use crate::config::TreeShakeConfig;
use crate::graph::ModuleGraph;
use crate::ignore::{IgnoreFilter, IgnoreRules};
use crate::module_id::ModuleId;
use crate::prune::{PruneOptions, SkippedModule, remove_unused_exports};
use crate::sweep::sweep;
use crate::transform::{CodegenTransformer, Transformer};

/// What a run did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShakeReport {
    pub modules_before: usize,
    pub modules_after: usize,
    /// Edges that contributed references during collection.
    pub references_collected: usize,
    /// Swept modules, in removal order.
    pub removed: Vec<ModuleId>,
    /// Modules whose tree was edited, including ones swept afterwards.
    pub edited: Vec<ModuleId>,
    pub skipped: Vec<SkippedModule>,
    /// Statements, declarators and specifiers deleted across all modules.
    pub removals: usize,
    /// Edges dropped while pruning.
    pub dropped_edges: usize,
    /// Edges dropped because their target was swept.
    pub dangling_edges_pruned: usize,
}

impl ShakeReport {
    fn untouched(modules: usize) -> Self {
        Self {
            modules_before: modules,
            modules_after: modules,
            ..Self::default()
        }
    }
}

/// Runs collection, pruning and sweeping over a resolved module graph.
///
/// ```rust,no_run
/// use fob_shake::{SourceGraphLoader, TreeShakeConfig, TreeShaker};
///
/// # async fn run() -> fob_shake::Result<()> {
/// let mut graph = SourceGraphLoader::new()
///     .entry("/app/main.js", "import { used } from './lib';\nused();")
///     .source("/app/lib.js", "export function used() {}\nexport function unused() {}")
///     .build()?;
///
/// let report = TreeShaker::with_config(TreeShakeConfig::default())?
///     .shake(&mut graph)
///     .await?;
/// println!("{} -> {} modules", report.modules_before, report.modules_after);
/// # Ok(())
/// # }
/// ```
pub struct TreeShaker {
    config: TreeShakeConfig,
    ignore: IgnoreRules,
    transformer: Box<dyn Transformer>,
}

impl TreeShaker {
    /// Validates `config` and compiles its ignore patterns.
    pub fn new(config: TreeShakeConfig, transformer: impl Transformer + 'static) -> Result<Self> {
        config.validate()?;
        let ignore = config.ignore_rules()?;
        Ok(Self {
            config,
            ignore,
            transformer: Box::new(transformer),
        })
    }

    /// Shaker regenerating output with [`CodegenTransformer`].
    pub fn with_config(config: TreeShakeConfig) -> Result<Self> {
        let transformer = CodegenTransformer::new().with_source_maps(config.source_maps);
        Self::new(config, transformer)
    }

    /// Protect additional modules from pruning and sweeping.
    pub fn with_ignore_filter(mut self, filter: impl IgnoreFilter + 'static) -> Self {
        self.ignore = self.ignore.with_filter(filter);
        self
    }

    pub fn config(&self) -> &TreeShakeConfig {
        &self.config
    }

    /// Shake `graph` in place.
    ///
    /// A graph failing validation is rejected before anything changes. Modules whose edit
    /// fails are reported in [`ShakeReport::skipped`] and kept as they were.
    pub async fn shake(&self, graph: &mut ModuleGraph) -> Result<ShakeReport> {
        if !self.config.enabled {
            tracing::debug!("[fob-shake] disabled, leaving {} modules", graph.len());
            return Ok(ShakeReport::untouched(graph.len()));
        }

        graph.validate()?;
        let modules_before = graph.len();
        tracing::info!("[fob-shake] shaking {} modules", modules_before);

        let references_collected = collect_exports(graph)?;

        let options = PruneOptions::from(&self.config);
        let pruned =
            remove_unused_exports(graph, &self.ignore, self.transformer.as_ref(), &options)
                .await?;

        let swept = sweep(graph, &self.ignore)?;

        let report = ShakeReport {
            modules_before,
            modules_after: graph.len(),
            references_collected,
            removed: swept.removed,
            edited: pruned.edited,
            skipped: pruned.skipped,
            removals: pruned.removals,
            dropped_edges: pruned.dropped_edges,
            dangling_edges_pruned: swept.dangling_edges,
        };

        tracing::info!(
            "[fob-shake] {} -> {} modules ({} edited, {} skipped, {} removed)",
            report.modules_before,
            report.modules_after,
            report.edited.len(),
            report.skipped.len(),
            report.removed.len()
        );
        Ok(report)
    }
}

impl std::fmt::Debug for TreeShaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeShaker")
            .field("config", &self.config)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShakeError;
    use crate::loader::SourceGraphLoader;

    fn graph() -> ModuleGraph {
        SourceGraphLoader::new()
            .entry("/app/main.js", "import { a } from './lib';\nconsole.log(a);")
            .source("/app/lib.js", "export const a = 1;\nexport const b = 2;")
            .source("/app/dead.js", "export const c = 3;")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_shaker_leaves_the_graph_alone() {
        let mut graph = graph();
        let config = TreeShakeConfig {
            enabled: false,
            ..TreeShakeConfig::default()
        };
        let report = TreeShaker::with_config(config)
            .unwrap()
            .shake(&mut graph)
            .await
            .unwrap();

        assert_eq!(report, ShakeReport::untouched(3));
        assert_eq!(graph.len(), 3);
    }

    #[tokio::test]
    async fn report_counts_every_phase() {
        let mut graph = graph();
        let report = TreeShaker::with_config(TreeShakeConfig::default())
            .unwrap()
            .shake(&mut graph)
            .await
            .unwrap();

        assert_eq!(report.modules_before, 3);
        assert_eq!(report.modules_after, 2);
        assert_eq!(report.references_collected, 1);
        assert_eq!(report.removed, vec![ModuleId::new("/app/dead.js").unwrap()]);
        // dead.js loses its export before it is swept.
        assert_eq!(
            report.edited,
            vec![
                ModuleId::new("/app/lib.js").unwrap(),
                ModuleId::new("/app/dead.js").unwrap()
            ]
        );
        assert_eq!(report.removals, 2);
        assert!(report.skipped.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["modulesAfter"], 2);
    }

    #[tokio::test]
    async fn custom_filters_protect_modules() {
        let mut graph = graph();
        let dead = ModuleId::new("/app/dead.js").unwrap();
        let keep = dead.clone();
        let report = TreeShaker::with_config(TreeShakeConfig::default())
            .unwrap()
            .with_ignore_filter(move |id: &ModuleId| id == &keep)
            .shake(&mut graph)
            .await
            .unwrap();

        assert!(report.removed.is_empty());
        assert!(graph.contains(&dead));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = TreeShakeConfig {
            transform_concurrency: 0,
            ..TreeShakeConfig::default()
        };
        assert!(matches!(
            TreeShaker::with_config(config),
            Err(ShakeError::Config(_))
        ));
    }
}
