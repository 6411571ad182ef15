use crate::{fsync_dir, StoreError};
use matomo_dl_schema::{ContentHash, ContentHashes};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Content cache rooted at a directory.
///
/// Each entry is a file named by its logical key plus a `.b3` sidecar with
/// the blake3 digest. Writes go through `NamedTempFile` + rename, so a
/// crashed write never leaves a torn entry; rewriting identical bytes under
/// the same key yields the identical hash set, making concurrent duplicate
/// writes safe.
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store verified bytes under a key and return their content hashes.
    pub fn put(&self, key: &str, data: &[u8]) -> Result<ContentHashes, StoreError> {
        validate_key(key)?;
        fs::create_dir_all(&self.root)?;

        let blake3_hex = blake3::hash(data).to_hex().to_string();
        let sha256_hex = hex_digest::<Sha256>(data);

        let dest = self.root.join(key);
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;

        let sum_dest = self.sum_path(key);
        let mut sum_tmp = NamedTempFile::new_in(&self.root)?;
        sum_tmp.write_all(blake3_hex.as_bytes())?;
        sum_tmp.as_file().sync_all()?;
        sum_tmp.persist(&sum_dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&self.root)?;

        tracing::debug!("cached {key} ({} bytes)", data.len());

        Ok(ContentHashes::from([
            ContentHash::from_parts("blake3", &blake3_hex),
            ContentHash::from_parts("sha256", &sha256_hex),
        ]))
    }

    /// Retrieve cached bytes by key, verifying integrity on read.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;

        let expected = fs::read_to_string(self.sum_path(key))?;
        let actual = blake3::hash(&data).to_hex().to_string();
        if actual != expected.trim() {
            return Err(StoreError::IntegrityFailure {
                key: key.to_owned(),
                expected: expected.trim().to_owned(),
                actual,
            });
        }
        Ok(Some(data))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.root.join(key).exists()
    }

    /// All cached keys, sorted. Sidecar files are not listed.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') && !name.ends_with(".b3") {
                    keys.push(name.to_owned());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn sum_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.b3"))
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_owned()))
    }
}

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    let digest = D::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
