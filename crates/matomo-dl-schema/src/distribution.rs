//! The user-authored distribution spec document.
//!
//! A distribution spec names a Matomo version constraint, the PHP runtime the
//! plugins must support, an optional Marketplace license key for restricted
//! plugins, and the desired plugin set. Its blake3 fingerprint is stored in
//! the lock file so spec drift is detectable.

use crate::normalize::normalize_name;
use crate::types::SpecHash;
use crate::version::{VersionSpec, VersionSpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Assumed PHP runtime when the spec does not state one.
pub const DEFAULT_PHP_VERSION: &str = "7.2";

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read distribution spec: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse distribution spec: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("invalid version spec: {0}")]
    Version(#[from] VersionSpecError),
    #[error("plugin name '{0}' normalizes to an empty identifier")]
    EmptyPluginName(String),
    #[error("plugins '{first}' and '{second}' normalize to the same identifier '{canonical}'")]
    DuplicatePluginName {
        first: String,
        second: String,
        canonical: String,
    },
}

/// How a single plugin is sourced.
///
/// In the spec document a bare string is a Marketplace version constraint and
/// a table with `git`/`ref` keys is a version-control source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSpec {
    Git {
        git: String,
        #[serde(rename = "ref")]
        git_ref: String,
    },
    Versioned(VersionSpec),
}

/// The parsed distribution spec document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionSpec {
    /// Matomo version constraint.
    pub version: VersionSpec,
    /// PHP runtime version plugins must be compatible with.
    #[serde(default)]
    pub php: Option<String>,
    /// Marketplace license key for restricted plugins. Never fingerprinted.
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginSpec>,
}

impl DistributionSpec {
    /// PHP version with the default applied.
    pub fn php_version(&self) -> &str {
        self.php.as_deref().unwrap_or(DEFAULT_PHP_VERSION)
    }

    /// Reject plugin names that collapse to nothing or collide after
    /// normalization; both would corrupt registry and cache keys.
    pub fn validate(&self) -> Result<(), SpecError> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for name in self.plugins.keys() {
            let canonical = normalize_name(name);
            if canonical.is_empty() {
                return Err(SpecError::EmptyPluginName(name.clone()));
            }
            if let Some(first) = seen.insert(canonical.clone(), name) {
                return Err(SpecError::DuplicatePluginName {
                    first: first.to_owned(),
                    second: name.clone(),
                    canonical,
                });
            }
        }
        Ok(())
    }

    /// Deterministic blake3 fingerprint of the spec's versioning-relevant
    /// fields. The license key is a secret and deliberately excluded.
    pub fn fingerprint(&self) -> SpecHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("version:{}", self.version).as_bytes());
        hasher.update(format!("php:{}", self.php_version()).as_bytes());

        // Plugins keyed by canonical name so display-name spelling is inert.
        let mut plugins: Vec<(String, &PluginSpec)> = self
            .plugins
            .iter()
            .map(|(name, spec)| (normalize_name(name), spec))
            .collect();
        plugins.sort_by(|a, b| a.0.cmp(&b.0));
        for (canonical, spec) in plugins {
            match spec {
                PluginSpec::Versioned(version) => {
                    hasher.update(format!("plugin:{canonical}:version:{version}").as_bytes());
                }
                PluginSpec::Git { git, git_ref } => {
                    hasher.update(format!("plugin:{canonical}:git:{git}@{git_ref}").as_bytes());
                }
            }
        }

        SpecHash::new(hasher.finalize().to_hex().to_string())
    }
}

pub fn parse_spec_str(input: &str) -> Result<DistributionSpec, SpecError> {
    let spec: DistributionSpec = toml::from_str(input)?;
    spec.validate()?;
    Ok(spec)
}

pub fn parse_spec_file(path: impl AsRef<Path>) -> Result<DistributionSpec, SpecError> {
    let content = fs::read_to_string(path)?;
    parse_spec_str(&content)
}
