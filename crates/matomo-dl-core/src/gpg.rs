//! Detached signature verification under an ephemeral keyring.
//!
//! Every verification runs in its own throwaway GNUPGHOME: the trust anchor
//! is imported into a `tempfile::TempDir`-backed keyring, the signature is
//! checked there, and the directory is removed when the keyring drops — on
//! success, verification failure, or import failure alike. No trust state
//! ever leaks between calls.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use thiserror::Error;

/// Fingerprint of the Matomo release signing key.
pub const MATOMO_RELEASE_FINGERPRINT: &str = "814E346FA01A20DBB04B6807B5DBD5925590A237";

/// Default keyserver for fetching the trust anchor.
pub const DEFAULT_KEYSERVER: &str = "hkps://keys.openpgp.org";

#[derive(Debug, Error)]
pub enum GpgError {
    #[error("unable to import release key: {0}")]
    KeyImport(String),
    #[error("signature does not match artifact: {0}")]
    Verification(String),
    #[error("gpg unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// Verifies an artifact against a detached signature under a trusted
/// fingerprint.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, data: &[u8], signature: &[u8], fingerprint: &str) -> Result<(), GpgError>;
}

/// Production verifier: one ephemeral [`Keyring`] per call, trust anchor
/// fetched from a keyserver by fingerprint.
pub struct GpgVerifier {
    keyserver: String,
}

impl Default for GpgVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GpgVerifier {
    pub fn new() -> Self {
        Self {
            keyserver: DEFAULT_KEYSERVER.to_owned(),
        }
    }

    pub fn with_keyserver(keyserver: &str) -> Self {
        Self {
            keyserver: keyserver.to_owned(),
        }
    }
}

impl SignatureVerifier for GpgVerifier {
    fn verify(&self, data: &[u8], signature: &[u8], fingerprint: &str) -> Result<(), GpgError> {
        let keyring = Keyring::create()?;
        keyring.receive_key(fingerprint, &self.keyserver)?;
        keyring.verify_detached(data, signature, fingerprint)
        // keyring (and its GNUPGHOME) torn down here on every path
    }
}

/// A call-scoped gpg keyring rooted in a private temporary GNUPGHOME.
pub struct Keyring {
    home: TempDir,
}

impl Keyring {
    pub fn create() -> Result<Self, GpgError> {
        let home = TempDir::new()?;
        Ok(Self { home })
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    fn gpg(&self) -> Command {
        let mut cmd = Command::new("gpg");
        cmd.arg("--homedir")
            .arg(self.home.path())
            .args(["--batch", "--no-tty", "--quiet"]);
        cmd
    }

    /// Import an ASCII-armored public key into this keyring.
    pub fn import_key(&self, armored: &[u8]) -> Result<(), GpgError> {
        let key_path = self.home.path().join("anchor.asc");
        fs::write(&key_path, armored)?;
        let output = self.gpg().arg("--import").arg(&key_path).output()?;
        if !output.status.success() {
            return Err(GpgError::KeyImport(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(())
    }

    /// Fetch a key by fingerprint from a keyserver into this keyring.
    pub fn receive_key(&self, fingerprint: &str, keyserver: &str) -> Result<(), GpgError> {
        let output = self
            .gpg()
            .args(["--keyserver", keyserver, "--recv-keys"])
            .arg(normalize_fingerprint(fingerprint))
            .output()?;
        if !output.status.success() {
            return Err(GpgError::KeyImport(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(())
    }

    /// Verify `signature` as a detached signature over `data`, requiring a
    /// VALIDSIG from exactly the expected fingerprint.
    pub fn verify_detached(
        &self,
        data: &[u8],
        signature: &[u8],
        fingerprint: &str,
    ) -> Result<(), GpgError> {
        let data_path = self.home.path().join("artifact");
        let sig_path = self.home.path().join("artifact.asc");
        fs::write(&data_path, data)?;
        fs::write(&sig_path, signature)?;

        let output = self
            .gpg()
            .args(["--status-fd", "1", "--verify"])
            .arg(&sig_path)
            .arg(&data_path)
            .output()?;

        let status = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(GpgError::Verification(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        if !has_valid_sig(&status, fingerprint) {
            return Err(GpgError::Verification(format!(
                "signature is valid but not from trusted key {fingerprint}"
            )));
        }
        Ok(())
    }
}

fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .trim()
        .trim_start_matches("0x")
        .to_ascii_uppercase()
}

/// Scan gpg `--status-fd` output for a VALIDSIG line naming the trusted
/// fingerprint.
fn has_valid_sig(status: &str, fingerprint: &str) -> bool {
    let expected = normalize_fingerprint(fingerprint);
    status.lines().any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some("[GNUPG:]")
            && fields.next() == Some("VALIDSIG")
            && fields.next().map(str::to_ascii_uppercase) == Some(expected.clone())
    })
}
