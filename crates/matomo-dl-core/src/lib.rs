//! The lock synchronization engine for matomo-dl.
//!
//! Ties together version resolution against the release catalog, detached
//! signature verification under the hard-coded release key, archive
//! inspection, content caching, and per-plugin variant dispatch, producing
//! an incrementally updated `LockFile`. Synchronization never mutates prior
//! lock values: an entry is either reused verbatim or replaced wholesale.

pub mod concurrency;
pub mod extract;
pub mod gpg;
pub mod matomo;
pub mod plugin;
pub mod resolver;
pub mod sync;
#[cfg(test)]
mod testutil;

pub use concurrency::{CancelFlag, StoreLock};
pub use gpg::{GpgError, GpgVerifier, Keyring, SignatureVerifier, MATOMO_RELEASE_FINGERPRINT};
pub use sync::{build_lock, SyncContext, SyncOptions};

use matomo_dl_remote::RemoteError;
use matomo_dl_schema::{LockError, SpecError};
use matomo_dl_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Transient transport or HTTP failure, propagated unchanged. Retry
    /// policy belongs to the transport collaborator, not this engine.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("no supported version: spec '{spec}' matched no candidate")]
    NoSupportedVersion { spec: String },
    #[error(transparent)]
    Gpg(#[from] GpgError),
    #[error("cannot determine extraction root: {candidates:?} candidate roots")]
    AmbiguousExtractionRoot { candidates: Vec<String> },
    #[error("unreadable archive: {0}")]
    Archive(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("synchronization cancelled")]
    Cancelled,
    #[error("matomo core: {source}")]
    Core {
        #[source]
        source: Box<SyncError>,
    },
    #[error("plugin '{name}': {source}")]
    Plugin {
        name: String,
        #[source]
        source: Box<SyncError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Attach the failing entity so the user never sees a bare failure.
    pub(crate) fn for_core(self) -> Self {
        match self {
            err @ (SyncError::Core { .. } | SyncError::Cancelled) => err,
            other => SyncError::Core {
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn for_plugin(self, name: &str) -> Self {
        match self {
            err @ (SyncError::Plugin { .. } | SyncError::Cancelled) => err,
            other => SyncError::Plugin {
                name: name.to_owned(),
                source: Box::new(other),
            },
        }
    }
}
