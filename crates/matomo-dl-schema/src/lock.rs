//! The fully resolved lock file.
//!
//! A lock file is the persisted, content-verified snapshot of one
//! distribution spec: the concrete Matomo version with its source link,
//! content hashes and extraction root, one entry per plugin, and the spec
//! fingerprint that produced it. Lock values are immutable once built;
//! synchronization replaces entries wholesale, never edits them in place.

use crate::types::{CommitId, ContentHashes, SpecHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version: {0}, expected 1")]
    UnsupportedVersion(u32),
}

/// The locked Matomo release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreLock {
    /// Concrete resolved version.
    pub version: String,
    /// Canonical download URL the artifact was fetched from.
    pub link: String,
    /// Content hashes of the cached archive.
    pub hashes: ContentHashes,
    /// Archive-internal path prefix under which `piwik.php` lives.
    pub extraction_root: String,
}

/// The locked state of one plugin. The variant always matches the plugin's
/// spec variant; a prior lock of the wrong variant is discarded, never
/// coerced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PluginLock {
    Versioned {
        version: String,
        link: String,
        hashes: ContentHashes,
    },
    Git {
        commit: CommitId,
        link: String,
        hashes: ContentHashes,
    },
}

impl PluginLock {
    pub fn hashes(&self) -> &ContentHashes {
        match self {
            PluginLock::Versioned { hashes, .. } | PluginLock::Git { hashes, .. } => hashes,
        }
    }

    pub fn link(&self) -> &str {
        match self {
            PluginLock::Versioned { link, .. } | PluginLock::Git { link, .. } => link,
        }
    }
}

/// A persisted, fully resolved snapshot of a distribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub lock_version: u32,
    pub core: CoreLock,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginLock>,
    /// Fingerprint of the distribution spec this lock was built from.
    pub spec_hash: SpecHash,
}

impl LockFile {
    pub const CURRENT_VERSION: u32 = 1;

    /// Pure aggregation of the core lock, the plugin lock mapping, and the
    /// spec fingerprint. No I/O.
    pub fn build(
        core: CoreLock,
        plugins: BTreeMap<String, PluginLock>,
        spec_hash: SpecHash,
    ) -> Self {
        LockFile {
            lock_version: Self::CURRENT_VERSION,
            core,
            plugins,
            spec_hash,
        }
    }

    /// Atomically replace the lock file on disk. A failed sync never leaves
    /// a partially written lock behind.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        // Fsync parent directory to ensure rename durability on power loss.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        let lock: LockFile = toml::from_str(&content)?;
        if lock.lock_version != Self::CURRENT_VERSION {
            return Err(LockError::UnsupportedVersion(lock.lock_version));
        }
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentHash;

    fn sample_hashes() -> ContentHashes {
        ContentHashes::from([
            ContentHash::from_parts("blake3", &"a".repeat(64)),
            ContentHash::from_parts("sha256", &"b".repeat(64)),
        ])
    }

    fn sample_lock() -> LockFile {
        let core = CoreLock {
            version: "4.11.0".to_owned(),
            link: "https://builds.matomo.org/matomo-4.11.0.zip".to_owned(),
            hashes: sample_hashes(),
            extraction_root: "matomo".to_owned(),
        };
        let plugins = BTreeMap::from([
            (
                "MyPlugin".to_owned(),
                PluginLock::Versioned {
                    version: "1.2.3".to_owned(),
                    link: "https://plugins.matomo.org/api/2.0/plugins/MyPlugin/download/1.2.3"
                        .to_owned(),
                    hashes: sample_hashes(),
                },
            ),
            (
                "Custom".to_owned(),
                PluginLock::Git {
                    commit: CommitId::new("c".repeat(40)),
                    link: "https://github.com/example/plugin/archive/cccc.zip".to_owned(),
                    hashes: sample_hashes(),
                },
            ),
        ]);
        LockFile::build(core, plugins, SpecHash::new("d".repeat(64)))
    }

    #[test]
    fn lock_roundtrip() {
        let lock = sample_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matomo.lock");

        lock.write_to_file(&path).unwrap();
        let loaded = LockFile::read_from_file(&path).unwrap();
        assert_eq!(lock, loaded);
    }

    #[test]
    fn variant_tags_survive_serialization() {
        let lock = sample_lock();
        let rendered = toml::to_string_pretty(&lock).unwrap();
        assert!(rendered.contains("kind = \"versioned\""));
        assert!(rendered.contains("kind = \"git\""));
    }

    #[test]
    fn write_replaces_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matomo.lock");

        let mut lock = sample_lock();
        lock.write_to_file(&path).unwrap();
        lock.core.version = "4.12.0".to_owned();
        lock.write_to_file(&path).unwrap();

        let loaded = LockFile::read_from_file(&path).unwrap();
        assert_eq!(loaded.core.version, "4.12.0");
    }

    #[test]
    fn unknown_lock_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matomo.lock");

        let mut lock = sample_lock();
        lock.lock_version = 99;
        lock.write_to_file(&path).unwrap();
        assert!(matches!(
            LockFile::read_from_file(&path),
            Err(LockError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn build_is_pure_aggregation() {
        let a = sample_lock();
        let b = LockFile::build(a.core.clone(), a.plugins.clone(), a.spec_hash.clone());
        assert_eq!(a, b);
    }
}
