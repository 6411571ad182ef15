//! Per-plugin lock synchronization.
//!
//! A plugin spec is one of two variants, and the variant decides the whole
//! strategy: registry-versioned plugins resolve against the marketplace,
//! git plugins resolve a ref to a commit. A prior lock entry is only ever
//! reused by the strategy that produced it; switching variants in the spec
//! discards the old entry outright.

use crate::sync::SyncContext;
use crate::SyncError;
use matomo_dl_remote::{PluginQuery, PluginVersion};
use matomo_dl_schema::version::cmp_versions;
use matomo_dl_schema::{normalize_name, PluginLock, PluginSpec, VersionSpec};
use tracing::{debug, info};

/// Distribution-level inputs that scope every plugin query.
pub struct PluginEnv<'a> {
    pub core_version: &'a str,
    pub php_version: &'a str,
    pub license_key: Option<&'a str>,
}

/// Synchronize one plugin's lock entry. Errors carry the plugin name.
pub fn sync_plugin_lock(
    ctx: &SyncContext<'_>,
    env: &PluginEnv<'_>,
    name: &str,
    spec: &PluginSpec,
    prior: Option<&PluginLock>,
) -> Result<PluginLock, SyncError> {
    let result = match spec {
        PluginSpec::Versioned(version_spec) => {
            sync_versioned(ctx, env, name, version_spec, prior)
        }
        PluginSpec::Git { git, git_ref } => sync_git(ctx, name, git, git_ref, prior),
    };
    result.map_err(|err| err.for_plugin(name))
}

fn sync_versioned(
    ctx: &SyncContext<'_>,
    env: &PluginEnv<'_>,
    name: &str,
    spec: &VersionSpec,
    prior: Option<&PluginLock>,
) -> Result<PluginLock, SyncError> {
    let canonical = normalize_name(name);

    // A pinned version matching the prior entry closes the fast path with
    // zero registry traffic.
    if let (Some(pinned), Some(prior @ PluginLock::Versioned { version, .. })) =
        (spec.pinned(), prior)
    {
        if version == pinned {
            debug!("plugin {canonical} pinned at {pinned}, reusing");
            return Ok(prior.clone());
        }
    }

    let query = PluginQuery {
        name: &canonical,
        core_version: env.core_version,
        php_version: env.php_version,
        license_key: env.license_key,
    };
    let candidates = ctx.registry.versions(&query)?;
    let chosen = select_version(spec, &candidates).ok_or_else(|| {
        SyncError::NoSupportedVersion {
            spec: format!("{canonical} {spec}"),
        }
    })?;

    if let Some(prior @ PluginLock::Versioned { version, .. }) = prior {
        if *version == chosen.version {
            debug!("plugin {canonical} still at {version}, reusing");
            return Ok(prior.clone());
        }
    }

    let data = ctx.registry.fetch(&query, &chosen.download_url)?;
    let key = format!("plugin-{canonical}-{}", chosen.version);
    let hashes = ctx.cache.put(&key, &data)?;
    info!("locked plugin {canonical} {}", chosen.version);

    Ok(PluginLock::Versioned {
        version: chosen.version.clone(),
        link: chosen.download_url.clone(),
        hashes,
    })
}

fn sync_git(
    ctx: &SyncContext<'_>,
    name: &str,
    remote: &str,
    git_ref: &str,
    prior: Option<&PluginLock>,
) -> Result<PluginLock, SyncError> {
    let canonical = normalize_name(name);
    let resolved = ctx.git.resolve_ref(remote, git_ref)?;

    if let Some(prior @ PluginLock::Git { commit, .. }) = prior {
        if *commit == resolved {
            debug!("plugin {canonical} still at {commit}, reusing");
            return Ok(prior.clone());
        }
    }

    let (link, data) = ctx.git.fetch_archive(remote, &resolved)?;
    let key = format!("plugin-{canonical}-git-{resolved}");
    let hashes = ctx.cache.put(&key, &data)?;
    info!("locked plugin {canonical} at {resolved}");

    Ok(PluginLock::Git {
        commit: resolved,
        link,
        hashes,
    })
}

/// Pick the highest candidate satisfying the constraint.
fn select_version<'a>(
    spec: &VersionSpec,
    candidates: &'a [PluginVersion],
) -> Option<&'a PluginVersion> {
    candidates
        .iter()
        .filter(|candidate| spec.matches(&candidate.version))
        .max_by(|a, b| cmp_versions(&a.version, &b.version))
}
