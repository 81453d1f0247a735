//! Tree shaking configuration.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ignore::IgnoreRules;

/// Environment variable prefix, e.g. `FOB_SHAKE_TRANSFORM_CONCURRENCY=2`.
pub const ENV_PREFIX: &str = "FOB_SHAKE_";

/// Settings for one tree shaking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeShakeConfig {
    /// When false the driver leaves the graph untouched.
    pub enabled: bool,

    /// Regular expressions matched against module paths. Matching modules are neither
    /// pruned nor swept.
    pub ignore: Vec<String>,

    pub interop_helpers: InteropHelpers,

    /// Upper bound on concurrent output regenerations.
    pub transform_concurrency: usize,

    /// Also delete unexported top-level declarations nothing references.
    pub prune_local_declarations: bool,

    /// Emit source maps alongside regenerated code.
    pub source_maps: bool,
}

/// Import sources of the transpiler's module interop helpers.
///
/// A helper import is dropped once the module no longer has an import it could wrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteropHelpers {
    /// Helpers wrapping default imports (`interopRequireDefault`).
    pub default: Vec<String>,
    /// Helpers wrapping default or namespace imports (`interopRequireWildcard`).
    pub namespace: Vec<String>,
}

impl Default for InteropHelpers {
    fn default() -> Self {
        Self {
            default: vec!["@babel/runtime/helpers/interopRequireDefault".to_string()],
            namespace: vec!["@babel/runtime/helpers/interopRequireWildcard".to_string()],
        }
    }
}

impl Default for TreeShakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore: vec!["babel".to_string(), "react-native/".to_string()],
            interop_helpers: InteropHelpers::default(),
            transform_concurrency: num_cpus::get().max(1),
            prune_local_declarations: true,
            source_maps: false,
        }
    }
}

impl TreeShakeConfig {
    /// Layered configuration sources.
    /// Priority: environment variables > config file > defaults
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(config_path))
    }

    /// Extract and validate configuration from an already assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|err| ConfigError::Load(Box::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transform_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transform_concurrency".to_string(),
                value: "0".to_string(),
            });
        }

        let helpers = self
            .interop_helpers
            .default
            .iter()
            .chain(&self.interop_helpers.namespace);
        for helper in helpers {
            if helper.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "interop_helpers".to_string(),
                    value: format!("{helper:?}"),
                });
            }
        }

        self.ignore_rules().map(|_| ())
    }

    /// Compile the ignore patterns.
    pub fn ignore_rules(&self) -> Result<IgnoreRules, ConfigError> {
        IgnoreRules::from_patterns(&self.ignore)
    }
}
