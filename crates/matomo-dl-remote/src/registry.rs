use crate::http::HttpClient;
use crate::{RemoteError, PLUGINS_URL};
use serde::Deserialize;

/// A registry lookup, scoped the way the Marketplace scopes compatibility.
/// `name` is the canonical (normalized) plugin identifier.
#[derive(Debug, Clone, Copy)]
pub struct PluginQuery<'a> {
    pub name: &'a str,
    pub core_version: &'a str,
    pub php_version: &'a str,
    pub license_key: Option<&'a str>,
}

/// One published plugin version with its download endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginVersion {
    pub version: String,
    pub download_url: String,
}

/// The plugin registry: enumerate published versions for a query, and fetch
/// a chosen artifact. HTTP errors propagate unmodified so retry policy can
/// be applied by the caller.
pub trait PluginRegistry: Send + Sync {
    fn versions(&self, query: &PluginQuery<'_>) -> Result<Vec<PluginVersion>, RemoteError>;
    fn fetch(&self, query: &PluginQuery<'_>, download_url: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Production registry over the Matomo plugin Marketplace API.
pub struct MarketplaceApi {
    http: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PluginInfoResponse {
    #[serde(default)]
    versions: Vec<PluginVersionInfo>,
}

#[derive(Debug, Deserialize)]
struct PluginVersionInfo {
    name: String,
    #[serde(default)]
    download: Option<String>,
}

impl MarketplaceApi {
    pub fn new(http: HttpClient) -> Self {
        Self::with_endpoint(http, PLUGINS_URL)
    }

    pub fn with_endpoint(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn info_url(&self, query: &PluginQuery<'_>) -> String {
        let mut url = format!(
            "{}/api/2.0/plugins/{}/info?coreVersion={}&phpVersion={}",
            self.base_url, query.name, query.core_version, query.php_version
        );
        if let Some(key) = query.license_key {
            url.push_str("&access_token=");
            url.push_str(key);
        }
        url
    }

    /// Resolve a possibly relative download path against the registry base.
    fn absolutize(&self, download: &str) -> String {
        if download.starts_with("http://") || download.starts_with("https://") {
            download.to_owned()
        } else {
            format!("{}/{}", self.base_url, download.trim_start_matches('/'))
        }
    }
}

impl PluginRegistry for MarketplaceApi {
    fn versions(&self, query: &PluginQuery<'_>) -> Result<Vec<PluginVersion>, RemoteError> {
        let url = self.info_url(query);
        let body = self.http.get_text(&url)?;
        let info: PluginInfoResponse =
            serde_json::from_str(&body).map_err(|e| RemoteError::Payload {
                url: url.clone(),
                reason: format!("invalid plugin info: {e}"),
            })?;
        Ok(info
            .versions
            .into_iter()
            .filter_map(|v| {
                v.download.map(|d| PluginVersion {
                    version: v.name,
                    download_url: self.absolutize(&d),
                })
            })
            .collect())
    }

    fn fetch(&self, query: &PluginQuery<'_>, download_url: &str) -> Result<Vec<u8>, RemoteError> {
        let mut url = download_url.to_owned();
        // Restricted plugins require the license token on the download too.
        if let Some(key) = query.license_key {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("access_token=");
            url.push_str(key);
        }
        self.http.get_bytes(&url)
    }
}
