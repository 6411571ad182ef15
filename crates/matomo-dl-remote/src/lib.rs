//! Remote access for matomo-dl: HTTP transport, the Matomo version catalog,
//! the plugin Marketplace registry, and git ref resolution.
//!
//! Retry and backoff policy deliberately lives outside this crate: transient
//! transport failures surface as `RemoteError::Network` and HTTP statuses
//! propagate unmodified so callers can decide what is retryable.

pub mod catalog;
pub mod git;
pub mod http;
pub mod registry;

pub use catalog::{extract_versions, BuildsCatalog, ReleaseArchive, VersionCatalog};
pub use git::{GitCli, GitRemote};
pub use http::HttpClient;
pub use registry::{MarketplaceApi, PluginQuery, PluginRegistry, PluginVersion};

/// Matomo release metadata API.
pub const API_URL: &str = "https://api.matomo.org";
/// Matomo release archive server (listing + artifacts + detached signatures).
pub const BUILDS_URL: &str = "https://builds.matomo.org";
/// Matomo plugin Marketplace.
pub const PLUGINS_URL: &str = "https://plugins.matomo.org";

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("HTTP {code} for {url}")]
    Status { code: u16, url: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid payload from {url}: {reason}")]
    Payload { url: String, reason: String },
    #[error("git error: {0}")]
    Git(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
