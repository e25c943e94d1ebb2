//! Manifest trait and the tagged union over envelope kinds
//!
//! Every format exposes the same three things to the storage layer: the
//! media type that routes it, the blobs it references, and the canonical
//! bytes that get hashed and stored.

use crate::error::ManifestError;
use crate::generic::GenericManifest;
use cas_artifact::Descriptor;
use std::fmt::Debug;
use std::sync::Arc;

/// Media type and canonical bytes of a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload<'a> {
    pub media_type: &'a str,
    pub bytes: &'a [u8],
}

/// A parsed manifest document
///
/// Implement this for third-party formats and wrap the value in
/// [`AnyManifest::Extension`].
///
/// # Contract
/// - `payload().bytes` is the exact byte sequence the manifest was built
///   from; it is what gets hashed and stored
/// - `media_type()` and `references()` are derived from those bytes and
///   never change after construction
pub trait Manifest: Send + Sync + Debug {
    /// Media type declared by the document
    fn media_type(&self) -> &str;

    /// Blobs this manifest depends on, in document order
    fn references(&self) -> &[Descriptor];

    /// Canonical payload
    ///
    /// # Errors
    /// Returns [`ManifestError::Uninitialized`] if the manifest holds no bytes
    fn payload(&self) -> Result<Payload<'_>, ManifestError>;
}

/// Every manifest kind the store can route
#[derive(Debug, Clone)]
pub enum AnyManifest {
    /// Built-in `x-application/` format
    Generic(GenericManifest),

    /// Format registered by a third party
    Extension(Arc<dyn Manifest>),
}

impl AnyManifest {
    /// Short name of the envelope kind, used in diagnostics
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generic(_) => "generic",
            Self::Extension(_) => "extension",
        }
    }

    /// The generic envelope, if this is one
    #[inline]
    #[must_use]
    pub fn as_generic(&self) -> Option<&GenericManifest> {
        match self {
            Self::Generic(m) => Some(m),
            Self::Extension(_) => None,
        }
    }

    /// Wrap a third-party manifest
    #[must_use]
    pub fn extension<M: Manifest + 'static>(manifest: M) -> Self {
        Self::Extension(Arc::new(manifest))
    }
}

impl From<GenericManifest> for AnyManifest {
    fn from(manifest: GenericManifest) -> Self {
        Self::Generic(manifest)
    }
}

impl Manifest for AnyManifest {
    fn media_type(&self) -> &str {
        match self {
            Self::Generic(m) => m.media_type(),
            Self::Extension(m) => m.media_type(),
        }
    }

    fn references(&self) -> &[Descriptor] {
        match self {
            Self::Generic(m) => m.references(),
            Self::Extension(m) => m.references(),
        }
    }

    fn payload(&self) -> Result<Payload<'_>, ManifestError> {
        match self {
            Self::Generic(m) => m.payload(),
            Self::Extension(m) => m.payload(),
        }
    }
}
