//! Storage configuration

use crate::error::ConfigError;
use cas_artifact::Algorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of reference checks in flight per put
pub const DEFAULT_VERIFY_CONCURRENCY: usize = 8;

/// Storage configuration
///
/// Loaded from TOML; every field is optional:
///
/// ```toml
/// root = "/var/lib/cas"
/// digest_algorithm = "sha256"
/// verify_concurrency = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory of the filesystem store
    pub root: PathBuf,
    /// Algorithm for newly stored blobs and manifests
    pub digest_algorithm: Algorithm,
    /// Reference checks in flight per put (values below 1 act as 1)
    pub verify_concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./cas-data"),
            digest_algorithm: Algorithm::Sha256,
            verify_concurrency: DEFAULT_VERIFY_CONCURRENCY,
        }
    }
}

impl StorageConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file can't be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// With digest algorithm
    #[inline]
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// With verification concurrency
    #[inline]
    #[must_use]
    pub fn with_verify_concurrency(mut self, concurrency: usize) -> Self {
        self.verify_concurrency = concurrency;
        self
    }

    /// Verification concurrency, at least 1
    #[inline]
    #[must_use]
    pub fn effective_verify_concurrency(&self) -> usize {
        self.verify_concurrency.max(1)
    }
}
