//! Generic manifest envelope
//!
//! [`GenericManifest`] is the built-in format for arbitrary artifact types
//! under the `x-application/` media type prefix. It keeps two views of one
//! value:
//!
//! - the canonical bytes, exactly as supplied (identity and storage truth)
//! - a parsed [`ManifestBody`] holding only what routing and verification
//!   need (convenience view)
//!
//! The parsed view is always derived from the bytes and has no setters, so
//! the two can never drift apart. Format-specific consumers re-parse the
//! canonical bytes into richer types with [`GenericManifest::decode`].

use crate::error::ManifestError;
use crate::manifest::{Manifest, Payload};
use crate::versioned::Versioned;
use cas_artifact::Descriptor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Media type prefix owned by the generic format
pub const GENERIC_MEDIA_TYPE_PREFIX: &str = "x-application/";

/// Indentation used when serializing values into canonical bytes
const CANONICAL_INDENT: &[u8] = b"   ";

/// Envelope fields shared by all generic manifests
///
/// Flatten this into a caller-defined struct to build manifests that carry
/// extra fields:
///
/// ```rust
/// use cas_manifest::{GenericManifest, ManifestBody, Versioned};
///
/// #[derive(serde::Serialize)]
/// struct Chart {
///     #[serde(flatten)]
///     body: ManifestBody,
///     chart_name: String,
/// }
///
/// let chart = Chart {
///     body: ManifestBody::new(Versioned::new(2, "x-application/chart")),
///     chart_name: "web".to_string(),
/// };
/// let manifest = GenericManifest::from_value(&chart).unwrap();
/// assert_eq!(manifest.schema_version(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ManifestBody {
    #[serde(flatten)]
    pub versioned: Versioned,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub references: Vec<Descriptor>,
}

/// `"references": null` reads as no references
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Descriptor>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let references: Option<Vec<Descriptor>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(references.unwrap_or_default())
}

impl ManifestBody {
    /// Body without references
    #[must_use]
    pub fn new(versioned: Versioned) -> Self {
        Self {
            versioned,
            references: Vec::new(),
        }
    }

    /// Add a reference (document order is preserved)
    #[must_use]
    pub fn with_reference(mut self, descriptor: Descriptor) -> Self {
        self.references.push(descriptor);
        self
    }
}

/// Generic manifest with its canonical JSON
///
/// # Invariants
/// - `canonical` is never modified after construction
/// - `body` is exactly what parsing `canonical` yields
/// - Equality compares canonical bytes only
#[derive(Debug, Clone)]
pub struct GenericManifest {
    body: ManifestBody,
    canonical: Arc<[u8]>,
}

impl GenericManifest {
    /// Parse a manifest, keeping `bytes` verbatim as the canonical form
    ///
    /// # Errors
    /// - [`ManifestError::Format`] if `bytes` is not a JSON object of the
    ///   envelope shape
    /// - [`ManifestError::MediaTypeMismatch`] if the media type does not
    ///   start with [`GENERIC_MEDIA_TYPE_PREFIX`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        Self::from_canonical(bytes.to_vec())
    }

    /// Serialize `value` into canonical bytes, then parse them
    ///
    /// Serialization is deterministic (fixed three-space indentation, field
    /// order from the type), so equal values produce identical bytes and an
    /// identical digest.
    ///
    /// # Errors
    /// Same as [`GenericManifest::from_bytes`], plus [`ManifestError::Format`]
    /// if `value` cannot be serialized
    pub fn from_value<T>(value: &T) -> Result<Self, ManifestError>
    where
        T: Serialize + ?Sized,
    {
        let mut canonical = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(CANONICAL_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut canonical, formatter);
        value.serialize(&mut serializer)?;
        Self::from_canonical(canonical)
    }

    fn from_canonical(canonical: Vec<u8>) -> Result<Self, ManifestError> {
        let body: ManifestBody = serde_json::from_slice(&canonical)?;

        if !body.versioned.media_type.starts_with(GENERIC_MEDIA_TYPE_PREFIX) {
            return Err(ManifestError::media_type_mismatch(
                GENERIC_MEDIA_TYPE_PREFIX,
                body.versioned.media_type,
            ));
        }

        Ok(Self {
            body,
            canonical: canonical.into(),
        })
    }

    /// Declared schema version
    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> i64 {
        self.body.versioned.schema_version
    }

    /// Parsed envelope view
    #[inline]
    #[must_use]
    pub fn body(&self) -> &ManifestBody {
        &self.body
    }

    /// Canonical bytes (empty only for a default-constructed envelope)
    #[inline]
    #[must_use]
    pub fn canonical(&self) -> &[u8] {
        &self.canonical
    }

    /// Re-parse the canonical bytes into a format-specific type
    ///
    /// # Errors
    /// Returns [`ManifestError::Uninitialized`] for an empty envelope and
    /// [`ManifestError::Format`] if the bytes don't fit `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ManifestError> {
        let payload = self.payload()?;
        Ok(serde_json::from_slice(payload.bytes)?)
    }
}

impl Default for GenericManifest {
    fn default() -> Self {
        Self {
            body: ManifestBody::default(),
            canonical: Arc::from(Vec::new()),
        }
    }
}

impl PartialEq for GenericManifest {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for GenericManifest {}

impl Manifest for GenericManifest {
    fn media_type(&self) -> &str {
        &self.body.versioned.media_type
    }

    fn references(&self) -> &[Descriptor] {
        &self.body.references
    }

    fn payload(&self) -> Result<Payload<'_>, ManifestError> {
        if self.canonical.is_empty() {
            return Err(ManifestError::Uninitialized);
        }
        Ok(Payload {
            media_type: &self.body.versioned.media_type,
            bytes: &self.canonical,
        })
    }
}
