use crate::http::HttpClient;
use crate::RemoteError;
use matomo_dl_schema::CommitId;
use std::process::Command;

/// A version-control remote: ref resolution and archive-at-commit retrieval.
pub trait GitRemote: Send + Sync {
    /// Resolve a tag, branch, or commit to a concrete commit id.
    fn resolve_ref(&self, remote: &str, git_ref: &str) -> Result<CommitId, RemoteError>;

    /// Fetch the archive at a commit; returns the source link and the bytes.
    fn fetch_archive(&self, remote: &str, commit: &CommitId)
        -> Result<(String, Vec<u8>), RemoteError>;
}

/// Production implementation: `git ls-remote` for ref resolution and the
/// forge `/archive/<commit>.zip` endpoint for retrieval.
pub struct GitCli {
    http: HttpClient,
}

impl GitCli {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

impl GitRemote for GitCli {
    fn resolve_ref(&self, remote: &str, git_ref: &str) -> Result<CommitId, RemoteError> {
        // A full commit id needs no network round trip.
        let candidate = CommitId::new(git_ref.to_ascii_lowercase());
        if candidate.is_full() {
            return Ok(candidate);
        }

        tracing::debug!("resolving ref '{git_ref}' against {remote}");
        let peeled = format!("{git_ref}^{{}}");
        let output = Command::new("git")
            .args(["ls-remote", remote, git_ref, &peeled])
            .output()
            .map_err(|e| RemoteError::Git(format!("failed to run git ls-remote: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemoteError::Git(format!(
                "git ls-remote failed for {remote}: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ls_remote(&stdout).ok_or_else(|| {
            RemoteError::Git(format!("ref '{git_ref}' not found in {remote}"))
        })
    }

    fn fetch_archive(
        &self,
        remote: &str,
        commit: &CommitId,
    ) -> Result<(String, Vec<u8>), RemoteError> {
        let url = archive_url(remote, commit);
        tracing::info!("downloading git archive {url}");
        let bytes = self.http.get_bytes(&url)?;
        Ok((url, bytes))
    }
}

/// Pick the commit from `git ls-remote` output. Annotated tags list both the
/// tag object and a peeled `^{}` entry pointing at the commit; the peeled
/// one wins.
fn parse_ls_remote(output: &str) -> Option<CommitId> {
    let mut first = None;
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(sha), Some(refname)) = (fields.next(), fields.next()) else {
            continue;
        };
        let id = CommitId::new(sha.to_ascii_lowercase());
        if !id.is_full() {
            continue;
        }
        if refname.ends_with("^{}") {
            return Some(id);
        }
        if first.is_none() {
            first = Some(id);
        }
    }
    first
}

/// Archive endpoint for a commit, GitHub/GitLab style.
fn archive_url(remote: &str, commit: &CommitId) -> String {
    let base = remote.trim_end_matches('/').trim_end_matches(".git");
    format!("{base}/archive/{commit}.zip")
}
