//! Whole-distribution lock synchronization.
//!
//! The core is synced first; plugin entries are then produced on a bounded
//! worker pool, each contributing to the output mapping under its own key.
//! Any fatal error or cancellation aborts the run before a `LockFile` is
//! built, so a previously persisted lock is never partially replaced.

use crate::concurrency::CancelFlag;
use crate::gpg::SignatureVerifier;
use crate::matomo::{self, ReleaseSource};
use crate::plugin::{self, PluginEnv};
use crate::SyncError;
use matomo_dl_remote::{GitRemote, PluginRegistry, VersionCatalog};
use matomo_dl_schema::{normalize_name, DistributionSpec, LockFile, PluginLock, PluginSpec};
use matomo_dl_store::ContentCache;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Everything a synchronization run needs, constructed once at startup and
/// passed explicitly — there is no ambient configuration.
pub struct SyncContext<'a> {
    pub catalog: &'a dyn VersionCatalog,
    pub release: &'a dyn ReleaseSource,
    pub registry: &'a dyn PluginRegistry,
    pub git: &'a dyn GitRemote,
    pub verifier: &'a dyn SignatureVerifier,
    pub cache: &'a ContentCache,
    /// Fingerprint the core artifact's signature must carry.
    pub trusted_fingerprint: &'a str,
    pub cancel: CancelFlag,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Upper bound on concurrent plugin syncs.
    pub jobs: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Synchronize a distribution spec into a lock file, reusing entries from
/// `prior` wherever their resolved version or commit is unchanged.
pub fn build_lock(
    ctx: &SyncContext<'_>,
    spec: &DistributionSpec,
    prior: Option<&LockFile>,
    options: SyncOptions,
) -> Result<LockFile, SyncError> {
    if ctx.cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let core = matomo::sync_core_lock(ctx, &spec.version, prior.map(|l| &l.core))
        .map_err(SyncError::for_core)?;

    let env = PluginEnv {
        core_version: &core.version,
        php_version: spec.php_version(),
        license_key: spec.license_key.as_deref(),
    };

    let plugins = sync_plugins(ctx, &env, &spec.plugins, prior, options)?;
    Ok(LockFile::build(core, plugins, spec.fingerprint()))
}

/// Sync all plugins on a bounded worker pool.
///
/// Workers drain a shared queue and insert results under disjoint keys, so
/// the only contention is the queue pop and the map insert. Each worker
/// checks the cancel flag between plugins. Output keys are the canonical
/// plugin identifiers, so respelling a display name leaves the lock file
/// untouched.
fn sync_plugins(
    ctx: &SyncContext<'_>,
    env: &PluginEnv<'_>,
    specs: &BTreeMap<String, PluginSpec>,
    prior: Option<&LockFile>,
    options: SyncOptions,
) -> Result<BTreeMap<String, PluginLock>, SyncError> {
    if specs.is_empty() {
        return Ok(BTreeMap::new());
    }

    let queue: Mutex<VecDeque<(&String, &PluginSpec)>> = Mutex::new(specs.iter().collect());
    let results: Mutex<BTreeMap<String, Result<PluginLock, SyncError>>> =
        Mutex::new(BTreeMap::new());

    let workers = options.jobs.max(1).min(specs.len());
    debug!("syncing {} plugins on {workers} workers", specs.len());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if ctx.cancel.is_cancelled() {
                    break;
                }
                let next = queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .pop_front();
                let Some((name, plugin_spec)) = next else {
                    break;
                };
                let canonical = normalize_name(name);
                let prior_lock = prior.and_then(|l| l.plugins.get(&canonical));
                let result = plugin::sync_plugin_lock(ctx, env, name, plugin_spec, prior_lock);
                results
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .insert(canonical, result);
            });
        }
    });

    if ctx.cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let mut locks = BTreeMap::new();
    let collected = results
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    for (name, result) in collected {
        locks.insert(name, result?);
    }
    Ok(locks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_context, Fakes};
    use matomo_dl_remote::PluginVersion;
    use matomo_dl_schema::{parse_spec_str, CommitId};

    fn spec_with_plugins() -> DistributionSpec {
        parse_spec_str(
            r#"
version = "4.*"
php = "8.1"

[plugins]
MyPlugin = "1.*"
Custom = { git = "https://git.test/example/custom", ref = "main" }
"#,
        )
        .unwrap()
    }

    fn populate(fakes: &Fakes) {
        fakes.registry.publish(
            "myplugin",
            &[
                PluginVersion {
                    version: "1.2.2".to_owned(),
                    download_url: "https://plugins.test/dl/1.2.2".to_owned(),
                },
                PluginVersion {
                    version: "1.2.3".to_owned(),
                    download_url: "https://plugins.test/dl/1.2.3".to_owned(),
                },
            ],
        );
        fakes.git.publish("main", &"a".repeat(40));
    }

    #[test]
    fn full_sync_produces_exact_plugin_key_set() {
        let fakes = Fakes::new("4.11.0", &["4.10.0", "4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);
        let spec = spec_with_plugins();

        let lock = build_lock(&ctx, &spec, None, SyncOptions::default()).unwrap();
        assert_eq!(lock.core.version, "4.11.0");
        // Lock keys are canonical identifiers, not display spellings.
        let keys: Vec<&str> = lock.plugins.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["custom", "myplugin"]);
        assert_eq!(lock.spec_hash, spec.fingerprint());
        assert!(matches!(
            lock.plugins["myplugin"],
            PluginLock::Versioned { ref version, .. } if version == "1.2.3"
        ));
        assert!(matches!(
            lock.plugins["custom"],
            PluginLock::Git { ref commit, .. } if *commit == CommitId::new("a".repeat(40))
        ));
    }

    #[test]
    fn resync_with_unchanged_spec_is_idempotent() {
        let fakes = Fakes::new("4.11.0", &["4.10.0", "4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);
        let spec = spec_with_plugins();

        let first = build_lock(&ctx, &spec, None, SyncOptions::default()).unwrap();
        let downloads_after_first =
            fakes.release.downloads() + fakes.registry.fetches() + fakes.git.fetches();

        let second = build_lock(&ctx, &spec, Some(&first), SyncOptions::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            fakes.release.downloads() + fakes.registry.fetches() + fakes.git.fetches(),
            downloads_after_first,
            "re-sync must not download anything"
        );
    }

    #[test]
    fn respelled_display_name_reuses_the_prior_entry() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);

        let first = build_lock(&ctx, &spec_with_plugins(), None, SyncOptions::default()).unwrap();
        let respelled = parse_spec_str(
            r#"
version = "4.*"
php = "8.1"

[plugins]
my_plugin = "1.*"
Custom = { git = "https://git.test/example/custom", ref = "main" }
"#,
        )
        .unwrap();
        let second =
            build_lock(&ctx, &respelled, Some(&first), SyncOptions::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fakes.registry.fetches(), 1);
    }

    #[test]
    fn removed_plugin_leaves_no_stale_lock_entry() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);

        let full = build_lock(&ctx, &spec_with_plugins(), None, SyncOptions::default()).unwrap();
        let reduced_spec = parse_spec_str("version = \"4.*\"\nphp = \"8.1\"\n[plugins]\nMyPlugin = \"1.*\"\n").unwrap();
        let reduced = build_lock(&ctx, &reduced_spec, Some(&full), SyncOptions::default()).unwrap();
        assert!(reduced.plugins.contains_key("myplugin"));
        assert!(!reduced.plugins.contains_key("custom"));
    }

    #[test]
    fn plugin_failure_names_the_plugin() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        // Registry knows nothing about "myplugin": resolution must fail.
        fakes.git.publish("main", &"a".repeat(40));
        let ctx = test_context(&fakes);

        let err =
            build_lock(&ctx, &spec_with_plugins(), None, SyncOptions::default()).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("MyPlugin"), "got: {rendered}");
    }

    #[test]
    fn core_failure_names_the_core() {
        let fakes = Fakes::new("5.0.0", &["5.0.0"]);
        let ctx = test_context(&fakes);
        let spec = parse_spec_str("version = \"6.*\"").unwrap();

        let err = build_lock(&ctx, &spec, None, SyncOptions::default()).unwrap_err();
        assert!(err.to_string().contains("matomo core"));
    }

    #[test]
    fn cancelled_run_produces_no_lock() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);
        ctx.cancel.cancel();

        assert!(matches!(
            build_lock(&ctx, &spec_with_plugins(), None, SyncOptions::default()),
            Err(SyncError::Cancelled)
        ));
    }

    #[test]
    fn pool_collects_every_plugin_under_contention() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        let ctx = test_context(&fakes);

        let mut doc = String::from("version = \"4.*\"\nphp = \"8.1\"\n[plugins]\n");
        let mut expected = Vec::new();
        for i in 0..24 {
            let name = format!("Plugin{i:02}");
            fakes.registry.publish(
                &normalize_name(&name),
                &[PluginVersion {
                    version: "1.0.0".to_owned(),
                    download_url: format!("https://plugins.test/dl/{name}"),
                }],
            );
            doc.push_str(&format!("{name} = \"1.0.0\"\n"));
            expected.push(normalize_name(&name));
        }
        let spec = parse_spec_str(&doc).unwrap();

        let lock = build_lock(&ctx, &spec, None, SyncOptions { jobs: 3 }).unwrap();
        let keys: Vec<String> = lock.plugins.keys().cloned().collect();
        assert_eq!(keys, expected, "every queued plugin must reach the lock");
    }

    #[test]
    fn single_worker_pool_still_completes() {
        let fakes = Fakes::new("4.11.0", &["4.11.0"]);
        populate(&fakes);
        let ctx = test_context(&fakes);

        let lock = build_lock(
            &ctx,
            &spec_with_plugins(),
            None,
            SyncOptions { jobs: 1 },
        )
        .unwrap();
        assert_eq!(lock.plugins.len(), 2);
    }
}
