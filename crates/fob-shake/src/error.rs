//! Error types for the shaking pass.
//!
//! Errors are split by blast radius: [`EditError`] stays local to one module (the module is
//! skipped and kept), everything wrapped in [`ShakeError`] aborts the pass.

use std::path::PathBuf;

use thiserror::Error;

use crate::export_table::CountError;
use crate::module_id::{ModuleId, ModuleIdError};

/// Pass-fatal errors.
#[derive(Debug, Error)]
pub enum ShakeError {
    #[error(transparent)]
    ModuleId(#[from] ModuleIdError),

    #[error("module `{0}` registered twice")]
    DuplicateModule(ModuleId),

    #[error("module `{key}` stored under a different id `{actual}`")]
    MisplacedModule { key: ModuleId, actual: ModuleId },

    #[error("entry point `{0}` is not part of the graph")]
    UnknownEntry(ModuleId),

    #[error("module `{0}` not found in graph")]
    MissingModule(ModuleId),

    #[error("module `{module}` has no dependency for `{specifier}`")]
    MissingDependency { module: ModuleId, specifier: String },

    #[error("reference counts of `{module}` became inconsistent: {source}")]
    Count {
        module: ModuleId,
        #[source]
        source: CountError,
    },

    #[error("failed to edit `{module}`: {source}")]
    Edit {
        module: ModuleId,
        #[source]
        source: EditError,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ShakeError {
    pub(crate) fn count(module: &ModuleId, source: CountError) -> Self {
        Self::Count {
            module: module.clone(),
            source,
        }
    }
}

/// Syntax tree failures. Scoped to a single module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("binding `{name}` could not be resolved")]
    UnresolvedBinding { name: String },

    #[error("edit addresses statement {statement} which is not an expected {expected}")]
    StaleTarget {
        statement: usize,
        expected: &'static str,
    },

    #[error("edit addresses index {index} of statement {statement} which does not exist")]
    OutOfRange { statement: usize, index: usize },

    #[error("release for `{specifier}` exceeds what the edge contributed")]
    ReleaseExceedsContribution { specifier: String },
}

/// Failure reported by a [`crate::Transformer`].
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to transform `{module}`: {message}")]
    Failed { module: ModuleId, message: String },

    #[error("failed to re-parse `{module}`: {message}")]
    Parse { module: ModuleId, message: String },
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for `{field}`: {value}")]
    InvalidValue { field: String, value: String },

    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}
