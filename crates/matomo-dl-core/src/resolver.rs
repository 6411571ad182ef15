//! Version resolution against the release catalog.
//!
//! Policy, cheapest first: an exact pin resolves with zero network calls;
//! otherwise the single "latest" endpoint is tried; only when latest does
//! not satisfy the constraint is the full listing enumerated.

use crate::SyncError;
use matomo_dl_remote::VersionCatalog;
use matomo_dl_schema::VersionSpec;
use tracing::debug;

/// Resolve a version spec to one concrete version string.
pub fn resolve(spec: &VersionSpec, catalog: &dyn VersionCatalog) -> Result<String, SyncError> {
    if let Some(pinned) = spec.pinned() {
        debug!("version pinned to {pinned}, skipping catalog");
        return Ok(pinned.to_owned());
    }

    let latest = catalog.latest()?;
    if spec.matches(&latest) {
        debug!("latest version {latest} satisfies '{spec}'");
        return Ok(latest);
    }

    let all = catalog.all_versions()?;
    debug!("latest {latest} rejected by '{spec}', enumerating {} candidates", all.len());
    spec.select(all.iter().map(String::as_str))
        .map(str::to_owned)
        .ok_or_else(|| SyncError::NoSupportedVersion {
            spec: spec.to_string(),
        })
}
