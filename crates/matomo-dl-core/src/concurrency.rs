use crate::SyncError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exclusive file lock guarding the cache and lock file against concurrent
/// sync runs. Released on drop.
pub struct StoreLock {
    lock_file: File,
}

impl StoreLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, SyncError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        file.lock_exclusive()
            .map_err(|e| SyncError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;

        Ok(Self { lock_file: file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Cooperative cancellation flag shared between the signal handler and the
/// sync workers. Workers check it between units of work; a cancelled run
/// never touches a previously persisted lock file.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Wire the flag to ctrl-c. A second interrupt exits immediately.
    pub fn install_signal_handler(&self) {
        let flag = self.clone();
        let _ = ctrlc::set_handler(move || {
            if flag.is_cancelled() {
                std::process::exit(1);
            }
            flag.cancel();
            eprintln!("\ninterrupt received, stopping after current downloads...");
        });
    }
}
