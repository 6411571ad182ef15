//! Core (Matomo release) lock synchronization.

use crate::sync::SyncContext;
use crate::{extract, resolver, SyncError};
use matomo_dl_remote::catalog::ReleaseArchive;
use matomo_dl_remote::RemoteError;
use matomo_dl_schema::CoreLock;
use tracing::{debug, info};

/// Release artifact endpoints: archive bytes plus detached signature.
pub trait ReleaseSource: Send + Sync {
    /// Fetch the archive for a version; returns `(canonical link, bytes)`.
    fn fetch(&self, version: &str) -> Result<(String, Vec<u8>), RemoteError>;

    fn fetch_signature(&self, version: &str) -> Result<Vec<u8>, RemoteError>;
}

impl ReleaseSource for ReleaseArchive {
    fn fetch(&self, version: &str) -> Result<(String, Vec<u8>), RemoteError> {
        ReleaseArchive::fetch(self, version)
    }

    fn fetch_signature(&self, version: &str) -> Result<Vec<u8>, RemoteError> {
        ReleaseArchive::fetch_signature(self, version)
    }
}

/// Synchronize the core lock entry.
///
/// The fast path reuses the prior lock untouched whenever the resolved
/// version matches it — no download, no verification, no cache write.
/// Otherwise the artifact and its detached signature are fetched and
/// verified against the trusted fingerprint *before* any bytes reach the
/// cache; unverified content is never stored.
pub fn sync_core_lock(
    ctx: &SyncContext<'_>,
    spec: &matomo_dl_schema::VersionSpec,
    prior: Option<&CoreLock>,
) -> Result<CoreLock, SyncError> {
    let version = resolver::resolve(spec, ctx.catalog)?;

    if let Some(prior) = prior {
        if prior.version == version {
            debug!("core lock for {version} unchanged, reusing");
            return Ok(prior.clone());
        }
    }

    let (link, data) = ctx.release.fetch(&version)?;
    let signature = ctx.release.fetch_signature(&version)?;
    ctx.verifier
        .verify(&data, &signature, ctx.trusted_fingerprint)?;

    let extraction_root = extract::extraction_root(&data)?;
    let hashes = ctx.cache.put(&format!("matomo-{version}-zip"), &data)?;
    info!("locked Matomo {version}");

    Ok(CoreLock {
        version,
        link,
        hashes,
        extraction_root,
    })
}
