//! Error types for the storage layer
//!
//! - [`BlobError`]: failures reported by a blob store
//! - [`VerificationError`] / [`ManifestVerificationError`]: put-time
//!   dependency checks, always reported as one aggregate
//! - [`StorageError`]: everything a manifest operation can fail with
//! - [`ConfigError`]: loading [`crate::StorageConfig`]

use crate::context::Canceled;
use cas_artifact::Digest;
use cas_manifest::ManifestError;
use std::fmt;
use std::path::PathBuf;

/// Failures reported by a blob store
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No blob with this digest
    #[error("blob unknown to registry: {0}")]
    BlobUnknown(Digest),

    /// Context finished before the call completed
    #[error("blob operation canceled")]
    Canceled,

    /// Stored bytes no longer hash to their digest
    #[error("blob {0} failed integrity check")]
    Corrupt(Digest),

    /// Filesystem failure
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blob metadata could not be read or written
    #[error("blob metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("blob store backend error: {0}")]
    Backend(String),
}

impl BlobError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the store reported the blob as absent
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::BlobUnknown(_))
    }
}

impl From<Canceled> for BlobError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}

/// One failed reference check
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Referenced blob is not in the store
    #[error("unknown blob {digest} on manifest")]
    DanglingReference { digest: Digest },

    /// Store failed while checking a reference
    #[error("verifying reference: {0}")]
    Store(#[source] BlobError),
}

impl VerificationError {
    /// Digest of a dangling reference
    #[inline]
    #[must_use]
    pub fn dangling_digest(&self) -> Option<&Digest> {
        match self {
            Self::DanglingReference { digest } => Some(digest),
            Self::Store(_) => None,
        }
    }
}

/// Every reference failure found while verifying one manifest
#[derive(Debug)]
pub struct ManifestVerificationError {
    errors: Vec<VerificationError>,
}

impl ManifestVerificationError {
    #[must_use]
    pub fn new(errors: Vec<VerificationError>) -> Self {
        Self { errors }
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[VerificationError] {
        &self.errors
    }

    /// Digests reported as dangling, in report order
    #[must_use]
    pub fn dangling_digests(&self) -> Vec<Digest> {
        self.errors
            .iter()
            .filter_map(VerificationError::dangling_digest)
            .copied()
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ManifestVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("manifest verification failed: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ManifestVerificationError {}

impl IntoIterator for ManifestVerificationError {
    type Item = VerificationError;
    type IntoIter = std::vec::IntoIter<VerificationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Errors from manifest handlers and the manifest service
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Parsing or dispatch failed
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Manifest routed to a handler that does not own its kind
    #[error("{expected} manifest handler cannot store {actual} manifest of type '{media_type}'")]
    WrongHandler {
        expected: &'static str,
        actual: &'static str,
        media_type: String,
    },

    /// One or more references failed verification
    #[error(transparent)]
    Verification(#[from] ManifestVerificationError),

    /// Blob store rejected the manifest payload
    #[error("committing manifest payload: {source}")]
    Commit {
        #[source]
        source: BlobError,
    },

    /// Blob store failed while reading a manifest
    #[error("fetching manifest {digest}: {source}")]
    Fetch {
        digest: Digest,
        #[source]
        source: BlobError,
    },

    /// No manifest stored under this digest
    #[error("manifest unknown: {0}")]
    ManifestUnknown(Digest),

    /// Context finished before the operation completed
    #[error("operation canceled")]
    Canceled,

    /// Other blob store failure
    #[error("blob store error: {0}")]
    Store(#[from] BlobError),

    /// Repository could not be opened
    #[error("invalid repository name: '{0}'")]
    InvalidRepositoryName(String),
}

impl StorageError {
    /// The verification aggregate, if this is one
    #[inline]
    #[must_use]
    pub fn as_verification(&self) -> Option<&ManifestVerificationError> {
        match self {
            Self::Verification(err) => Some(err),
            _ => None,
        }
    }

    /// True for cancellation and deadline expiry
    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<Canceled> for StorageError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}

/// Errors loading storage configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::StorageConfig`]
    #[error("invalid storage config: {0}")]
    Parse(#[from] toml::de::Error),
}
