use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use matomo_dl_core::{
    build_lock, CancelFlag, GpgVerifier, StoreLock, SyncContext, SyncOptions,
    MATOMO_RELEASE_FINGERPRINT,
};
use matomo_dl_remote::{BuildsCatalog, GitCli, HttpClient, MarketplaceApi, ReleaseArchive};
use matomo_dl_schema::{parse_spec_file, LockFile};
use matomo_dl_store::ContentCache;
use std::path::Path;

pub fn run(
    distribution: &Path,
    lock_path: &Path,
    cache_dir: &Path,
    jobs: usize,
    json: bool,
) -> Result<u8, String> {
    let spec = parse_spec_file(distribution).map_err(|e| format!("distribution spec: {e}"))?;
    spec.validate()
        .map_err(|e| format!("distribution spec: {e}"))?;

    let _guard = StoreLock::acquire(&cache_dir.join(".lock"))
        .map_err(|e| format!("store lock: {e}"))?;

    let prior = if lock_path.exists() {
        Some(LockFile::read_from_file(lock_path).map_err(|e| format!("lock file: {e}"))?)
    } else {
        None
    };

    let http = HttpClient::new();
    let catalog = BuildsCatalog::new(http.clone());
    let release = ReleaseArchive::new(http.clone());
    let registry = MarketplaceApi::new(http.clone());
    let git = GitCli::new(http);
    let verifier = GpgVerifier::new();
    let cache = ContentCache::new(cache_dir);

    let cancel = CancelFlag::new();
    cancel.install_signal_handler();

    let ctx = SyncContext {
        catalog: &catalog,
        release: &release,
        registry: &registry,
        git: &git,
        verifier: &verifier,
        cache: &cache,
        trusted_fingerprint: MATOMO_RELEASE_FINGERPRINT,
        cancel,
    };

    let pb = if json {
        None
    } else {
        Some(spinner("synchronizing lock file..."))
    };

    let built = match build_lock(&ctx, &spec, prior.as_ref(), SyncOptions { jobs }) {
        Ok(lock) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "lock synchronized");
            }
            lock
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "sync failed");
            }
            return Err(e.to_string());
        }
    };

    let changed = prior.as_ref() != Some(&built);
    if changed {
        built
            .write_to_file(lock_path)
            .map_err(|e| format!("lock file: {e}"))?;
    }

    if json {
        let payload = serde_json::json!({
            "core": built.core.version,
            "plugins": built.plugins.len(),
            "changed": changed,
            "lock": lock_path.display().to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else if changed {
        println!(
            "locked Matomo {} with {} plugin(s) -> {}",
            built.core.version,
            built.plugins.len(),
            lock_path.display()
        );
    } else {
        println!("{} is up to date", lock_path.display());
    }
    Ok(EXIT_SUCCESS)
}
