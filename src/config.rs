//! Registry configuration loaded from TOML.
//!
//! ```toml
//! conflict_policy = "replace"
//!
//! [[providers]]
//! contributor = "org.example.admin"
//! class = "configuration-wizard"
//! ids = "wizard, wizard.finished"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConflictPolicy;

/// Failure to read or parse a registry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level registry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// How conflicting registrations are handled.
    pub conflict_policy: ConflictPolicy,

    /// Providers to register at startup.
    pub providers: Vec<ProviderConfig>,
}

/// A statically declared provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Who supplies the provider; used in diagnostics and as part of its key.
    pub contributor: String,

    /// Name of the factory implementation in the [`Catalog`](crate::Catalog).
    pub class: String,

    /// Comma-separated identifiers the factory serves.
    pub ids: String,
}

impl RegistryConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Splits a comma-separated identifier list, trimming whitespace and dropping
/// empty entries.
pub fn split_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
