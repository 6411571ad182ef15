//! Keyed, integrity-verified content cache for matomo-dl artifacts.
//!
//! Downloaded archives are cached under logical keys (e.g.
//! `matomo-4.11.0-zip`) so an unchanged lock entry never re-downloads its
//! artifact. Writes are atomic, reads verify the recorded blake3 digest,
//! and `put` returns the content-hash set that the lock file pins.

pub mod cache;

pub use cache::ContentCache;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cache key '{0}': expected [A-Za-z0-9._-]+")]
    InvalidKey(String),
    #[error("cache integrity failure for '{key}': expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Fsync a directory so a prior rename survives power loss.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), StoreError> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()?;
    Ok(())
}
