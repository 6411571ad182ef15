use crate::http::HttpClient;
use crate::{RemoteError, API_URL, BUILDS_URL};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A version catalog for the Matomo core: a cheap "latest" endpoint and a
/// full listing enumeration as the fallback.
pub trait VersionCatalog: Send + Sync {
    fn latest(&self) -> Result<String, RemoteError>;
    fn all_versions(&self) -> Result<BTreeSet<String>, RemoteError>;
}

/// Production catalog over api.matomo.org and builds.matomo.org.
pub struct BuildsCatalog {
    http: HttpClient,
    api_url: String,
    builds_url: String,
}

impl BuildsCatalog {
    pub fn new(http: HttpClient) -> Self {
        Self::with_endpoints(http, API_URL, BUILDS_URL)
    }

    /// Endpoint override for tests.
    pub fn with_endpoints(http: HttpClient, api_url: &str, builds_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_owned(),
            builds_url: builds_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl VersionCatalog for BuildsCatalog {
    fn latest(&self) -> Result<String, RemoteError> {
        let url = format!("{}/1.0/getLatestVersion/", self.api_url);
        let body = self.http.get_text(&url)?;
        let version = body.trim().to_owned();
        if version.is_empty() {
            return Err(RemoteError::Payload {
                url,
                reason: "empty latest-version response".to_owned(),
            });
        }
        Ok(version)
    }

    fn all_versions(&self) -> Result<BTreeSet<String>, RemoteError> {
        let body = self.http.get_text(&self.builds_url)?;
        Ok(extract_versions(&body))
    }
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href\s*=\s*"([^"]+)""#).expect("static pattern"))
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"matomo-([0-9]+[^/]*?)\.(?:zip|tar\.gz)(?:\.asc)?$").expect("static pattern")
    })
}

/// Extract version tokens from the builds index HTML.
///
/// Only hrefs naming a `matomo-<version>.zip` or `.tar.gz` artifact count;
/// an archive and its detached `.asc` signature collapse to one token.
pub fn extract_versions(html: &str) -> BTreeSet<String> {
    let mut versions = BTreeSet::new();
    for caps in href_re().captures_iter(html) {
        let href = &caps[1];
        if let Some(m) = version_re().captures(href) {
            versions.insert(m[1].to_owned());
        }
    }
    versions
}

/// Deterministic artifact endpoints on the builds server, per resolved
/// version: `matomo-{version}.zip` and its detached signature.
pub struct ReleaseArchive {
    http: HttpClient,
    builds_url: String,
}

impl ReleaseArchive {
    pub fn new(http: HttpClient) -> Self {
        Self::with_endpoint(http, BUILDS_URL)
    }

    pub fn with_endpoint(http: HttpClient, builds_url: &str) -> Self {
        Self {
            http,
            builds_url: builds_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn download_url(&self, version: &str) -> String {
        format!("{}/matomo-{version}.zip", self.builds_url)
    }

    pub fn signature_url(&self, version: &str) -> String {
        format!("{}/matomo-{version}.zip.asc", self.builds_url)
    }

    /// Fetch the release archive; returns the canonical link and the bytes.
    pub fn fetch(&self, version: &str) -> Result<(String, Vec<u8>), RemoteError> {
        let url = self.download_url(version);
        tracing::info!("downloading Matomo release {version}");
        let bytes = self.http.get_bytes(&url)?;
        Ok((url, bytes))
    }

    pub fn fetch_signature(&self, version: &str) -> Result<Vec<u8>, RemoteError> {
        self.http.get_bytes(&self.signature_url(version))
    }
}
