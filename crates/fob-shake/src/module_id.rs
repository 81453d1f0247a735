use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const VIRTUAL_PREFIX: &str = "virtual:";

/// Stable identifier of a module in the shaking graph.
///
/// Identifiers are absolute, cleaned filesystem paths (canonicalised when the file exists) so
/// that the same module reached through `./a/../b.js` and `b.js` maps to one graph key.
/// Bundler-generated modules keep a `virtual:` prefix and are never canonicalised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create a new module identifier from a filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }

        if looks_like_virtual(path) {
            return Ok(Self(normalize_virtual(path)));
        }

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ModuleIdError::CurrentDir { source })?
                .join(path)
        };

        let cleaned = joined.clean();

        match std::fs::canonicalize(&cleaned) {
            Ok(canonical) => Ok(Self(canonical)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self(cleaned)),
            Err(err) => Err(ModuleIdError::Canonicalization {
                path: cleaned,
                source: err,
            }),
        }
    }

    /// Create an identifier for a bundler-generated module (e.g. `virtual:runtime`).
    pub fn new_virtual(id: impl Into<String>) -> Self {
        let id = id.into();

        if id.is_empty() {
            return Self(PathBuf::from(VIRTUAL_PREFIX));
        }

        let normalized = if id.starts_with(VIRTUAL_PREFIX) {
            id
        } else {
            format!("{VIRTUAL_PREFIX}{id}")
        };

        Self(PathBuf::from(normalized))
    }

    /// Returns the underlying path representation.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns `true` if the identifier represents a virtual module.
    pub fn is_virtual(&self) -> bool {
        self.path_string().starts_with(VIRTUAL_PREFIX)
    }

    /// Borrow the identifier as a string for logging/serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        if value.starts_with(VIRTUAL_PREFIX) {
            Ok(ModuleId::new_virtual(value))
        } else {
            Ok(ModuleId(PathBuf::from(value)))
        }
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Error)]
pub enum ModuleIdError {
    /// The provided path was empty.
    #[error("module id path is empty")]
    EmptyPath,

    /// Failed to resolve the current working directory for relative paths.
    #[error("failed to resolve current directory: {source}")]
    CurrentDir {
        #[source]
        source: io::Error,
    },

    /// Canonicalisation failed for reasons other than `NotFound`.
    #[error("failed to canonicalize path '{path}': {source}")]
    Canonicalization {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn looks_like_virtual(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.starts_with(VIRTUAL_PREFIX) || text.starts_with('\0')
}

fn normalize_virtual(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if text.starts_with(VIRTUAL_PREFIX) {
        PathBuf::from(text.into_owned())
    } else {
        let trimmed = text.trim_start_matches('\0');
        PathBuf::from(format!("{VIRTUAL_PREFIX}{trimmed}"))
    }
}
