//! # fob-shake
//!
//! Cross-module tree shaking over a resolved module graph.
//!
//! Works on a graph whose modules own their parsed syntax tree and whose edges record how
//! each import site uses its target. A run has three passes:
//!
//! 1. **Collect** ([`collect_exports`]): fold every edge's usage into the export reference
//!    table of its target, importers first so re-exports forward only what is requested.
//! 2. **Prune** ([`remove_unused_exports`]): delete unreferenced exports from every module
//!    that is neither an entry point nor ignored, give their import usage back to the
//!    modules they came from, then regenerate the edited modules' output.
//! 3. **Sweep** ([`sweep`]): delete modules nobody references any more, cascading, and drop
//!    edges left pointing at them.
//!
//! ```text
//!   ModuleGraph ──► collect ──► prune ──► sweep ──► ModuleGraph
//!                     │           │  ▲       │
//!                     ▼           ▼  │       ▼
//!                ExportTable   SyntaxTree  dangling edges
//!                  counts      Transformer
//! ```
//!
//! [`TreeShaker`] runs the passes in order and returns a [`ShakeReport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fob_shake::{SourceGraphLoader, TreeShakeConfig, TreeShaker};
//!
//! # async fn run() -> fob_shake::Result<()> {
//! let mut graph = SourceGraphLoader::new()
//!     .entry("/app/main.js", "import { b } from './lib';\nb();")
//!     .source("/app/lib.js", "export function a() {}\nexport function b() {}")
//!     .build()?;
//!
//! let config = TreeShakeConfig::load(None)?;
//! let report = TreeShaker::with_config(config)?.shake(&mut graph).await?;
//! assert_eq!(report.modules_after, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The passes emit `tracing` events only. Enable the `logging` feature for
//! [`logging::init_logging`], a ready-made subscriber for binaries.

pub mod collect;
pub mod config;
pub mod editor;
pub mod error;
pub mod export_table;
pub mod graph;
pub mod ignore;
pub mod loader;
pub mod module;
pub mod module_id;
pub mod prune;
pub mod shaker;
pub mod sweep;
pub mod transform;

#[cfg(feature = "logging")]
pub mod logging;

pub use collect::collect_exports;
pub use config::{InteropHelpers, TreeShakeConfig};
pub use editor::{EditPlan, ModuleOutline, OxcTree, SyntaxTree, TextRange};
pub use error::{ConfigError, EditError, ShakeError, TransformError};
pub use export_table::{CountError, ExportTable, ImportUsage};
pub use graph::ModuleGraph;
pub use ignore::{IgnoreFilter, IgnoreRules};
pub use loader::SourceGraphLoader;
pub use module::{Dependency, Module, ModuleBuilder, ModuleOutput};
pub use module_id::{ModuleId, ModuleIdError};
pub use prune::{PruneOptions, PruneOutcome, SkippedModule, remove_unused_exports};
pub use shaker::{ShakeReport, TreeShaker};
pub use sweep::{SweepOutcome, sweep};
pub use transform::{CodegenTransformer, Transformer};

/// Result type alias for shaking operations.
pub type Result<T> = std::result::Result<T, ShakeError>;

#[cfg(test)]
mod tests;
