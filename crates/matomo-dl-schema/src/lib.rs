//! Distribution spec parsing, version constraints, plugin name normalization,
//! and lock file schema for matomo-dl.
//!
//! This crate defines the schema layer: the TOML distribution spec
//! (`DistributionSpec`), version constraint parsing and best-match selection
//! (`VersionSpec`), canonical plugin naming (`normalize_name`), the derived
//! spec fingerprint, and the fully resolved lock file (`LockFile`).

pub mod distribution;
pub mod lock;
pub mod normalize;
pub mod types;
pub mod version;

pub use distribution::{
    parse_spec_file, parse_spec_str, DistributionSpec, PluginSpec, SpecError,
    DEFAULT_PHP_VERSION,
};
pub use lock::{CoreLock, LockError, LockFile, PluginLock};
pub use normalize::normalize_name;
pub use types::{CommitId, ContentHash, ContentHashes, SpecHash};
pub use version::{VersionSpec, VersionSpecError};
