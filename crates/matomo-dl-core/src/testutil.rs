//! In-memory collaborators for engine tests.
//!
//! Every fake counts its expensive operations so tests can assert the "no
//! network on reuse" properties directly instead of inferring them.

use crate::concurrency::CancelFlag;
use crate::extract::tests::make_zip;
use crate::gpg::{GpgError, SignatureVerifier};
use crate::matomo::ReleaseSource;
use crate::resolver::tests::FakeCatalog;
use crate::sync::SyncContext;
use matomo_dl_remote::{
    GitRemote, PluginQuery, PluginRegistry, PluginVersion, RemoteError,
};
use matomo_dl_schema::CommitId;
use matomo_dl_store::ContentCache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

pub(crate) struct FakeRelease {
    archive: Vec<u8>,
    downloads: AtomicUsize,
}

impl FakeRelease {
    fn new() -> Self {
        Self {
            archive: make_zip(&["matomo/piwik.php", "matomo/index.php"]),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ReleaseSource for FakeRelease {
    fn fetch(&self, version: &str) -> Result<(String, Vec<u8>), RemoteError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok((
            format!("https://builds.test/matomo-{version}.zip"),
            self.archive.clone(),
        ))
    }

    fn fetch_signature(&self, _version: &str) -> Result<Vec<u8>, RemoteError> {
        Ok(b"detached-signature".to_vec())
    }
}

pub(crate) struct FakeVerifier {
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeVerifier {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl SignatureVerifier for FakeVerifier {
    fn verify(&self, _data: &[u8], _signature: &[u8], fingerprint: &str) -> Result<(), GpgError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GpgError::Verification(format!(
                "no valid signature from {fingerprint}"
            )));
        }
        Ok(())
    }
}

pub(crate) struct FakeRegistry {
    entries: Mutex<HashMap<String, Vec<PluginVersion>>>,
    queried: Mutex<Vec<String>>,
    version_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeRegistry {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            queried: Mutex::new(Vec::new()),
            version_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, canonical_name: &str, versions: &[PluginVersion]) {
        self.entries
            .lock()
            .unwrap()
            .insert(canonical_name.to_owned(), versions.to_vec());
    }

    pub fn queried_names(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl PluginRegistry for FakeRegistry {
    fn versions(&self, query: &PluginQuery<'_>) -> Result<Vec<PluginVersion>, RemoteError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(query.name.to_owned());
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(query.name)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch(&self, _query: &PluginQuery<'_>, download_url: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("plugin-archive:{download_url}").into_bytes())
    }
}

pub(crate) struct FakeGit {
    refs: Mutex<HashMap<String, String>>,
    fetch_calls: AtomicUsize,
}

impl FakeGit {
    fn new() -> Self {
        Self {
            refs: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, git_ref: &str, commit: &str) {
        self.refs
            .lock()
            .unwrap()
            .insert(git_ref.to_owned(), commit.to_owned());
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl GitRemote for FakeGit {
    fn resolve_ref(&self, _remote: &str, git_ref: &str) -> Result<CommitId, RemoteError> {
        let candidate = CommitId::new(git_ref.to_ascii_lowercase());
        if candidate.is_full() {
            return Ok(candidate);
        }
        self.refs
            .lock()
            .unwrap()
            .get(git_ref)
            .map(|commit| CommitId::new(commit.clone()))
            .ok_or_else(|| RemoteError::Git(format!("unknown ref {git_ref}")))
    }

    fn fetch_archive(
        &self,
        remote: &str,
        commit: &CommitId,
    ) -> Result<(String, Vec<u8>), RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok((
            format!("{remote}/archive/{commit}.zip"),
            format!("git-archive:{commit}").into_bytes(),
        ))
    }
}

/// A bundle of fakes plus a real on-disk cache in a temp directory.
pub(crate) struct Fakes {
    pub catalog: FakeCatalog,
    pub release: FakeRelease,
    pub registry: FakeRegistry,
    pub git: FakeGit,
    pub verifier: FakeVerifier,
    pub cache: ContentCache,
    pub cancel: CancelFlag,
    _dir: TempDir,
}

impl Fakes {
    pub fn new(latest: &str, all: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            catalog: FakeCatalog::new(latest, all),
            release: FakeRelease::new(),
            registry: FakeRegistry::new(),
            git: FakeGit::new(),
            verifier: FakeVerifier::new(),
            cache: ContentCache::new(dir.path().join("cache")),
            cancel: CancelFlag::new(),
            _dir: dir,
        }
    }
}

pub(crate) fn test_context(fakes: &Fakes) -> SyncContext<'_> {
    SyncContext {
        catalog: &fakes.catalog,
        release: &fakes.release,
        registry: &fakes.registry,
        git: &fakes.git,
        verifier: &fakes.verifier,
        cache: &fakes.cache,
        trusted_fingerprint: crate::gpg::MATOMO_RELEASE_FINGERPRINT,
        cancel: fakes.cancel.clone(),
    }
}
