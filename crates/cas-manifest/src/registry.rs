//! Manifest format registry
//!
//! Formats are registered by media type prefix during an explicit startup
//! phase ([`FormatRegistryBuilder`]). [`FormatRegistryBuilder::build`]
//! freezes the table; the resulting [`FormatRegistry`] is read-only and is
//! shared between threads behind an `Arc` without locking.

use crate::error::ManifestError;
use crate::generic::GenericManifest;
use crate::manifest::{AnyManifest, Manifest};
use crate::prefix::PrefixTable;
use cas_artifact::{Algorithm, Descriptor};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Parse function turning raw bytes into a manifest
pub type ParseFn = Arc<dyn Fn(&[u8]) -> Result<AnyManifest, ManifestError> + Send + Sync>;

static GLOBAL: Lazy<Arc<FormatRegistry>> = Lazy::new(|| Arc::new(FormatRegistry::with_defaults()));

fn generic_parse_fn() -> ParseFn {
    Arc::new(|bytes: &[u8]| GenericManifest::from_bytes(bytes).map(AnyManifest::Generic))
}

/// Startup-phase registry builder
pub struct FormatRegistryBuilder {
    table: PrefixTable<ParseFn>,
    algorithm: Algorithm,
}

impl Default for FormatRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistryBuilder")
            .field("prefixes", &self.table.prefixes())
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl FormatRegistryBuilder {
    /// Builder with no formats
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: PrefixTable::new(),
            algorithm: Algorithm::default(),
        }
    }

    /// Builder with the generic `x-application/` format registered
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            table: PrefixTable::with_generic(generic_parse_fn()),
            algorithm: Algorithm::default(),
        }
    }

    /// Digest algorithm for descriptors produced by dispatch
    #[inline]
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Register a parse function for every media type starting with `prefix`
    ///
    /// # Errors
    /// Returns [`ManifestError::DuplicateRegistration`] if `prefix` overlaps
    /// a registered prefix, [`ManifestError::InvalidPrefix`] if it is empty
    pub fn register<F>(&mut self, prefix: &str, parse: F) -> Result<&mut Self, ManifestError>
    where
        F: Fn(&[u8]) -> Result<AnyManifest, ManifestError> + Send + Sync + 'static,
    {
        self.table.insert(prefix, Arc::new(parse))?;
        tracing::debug!(prefix, "registered manifest format");
        Ok(self)
    }

    /// Freeze the registry
    #[must_use]
    pub fn build(self) -> FormatRegistry {
        FormatRegistry {
            table: self.table,
            algorithm: self.algorithm,
        }
    }
}

/// Frozen `(prefix → parse function)` table
#[derive(Clone)]
pub struct FormatRegistry {
    table: PrefixTable<ParseFn>,
    algorithm: Algorithm,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("prefixes", &self.table.prefixes())
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Start a registration phase
    #[inline]
    #[must_use]
    pub fn builder() -> FormatRegistryBuilder {
        FormatRegistryBuilder::new()
    }

    /// Registry with the built-in formats
    #[must_use]
    pub fn with_defaults() -> Self {
        FormatRegistryBuilder::with_defaults().build()
    }

    /// Process-wide registry with the built-in formats
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Parse `bytes` with the format registered for `media_type`
    ///
    /// Returns the manifest together with a descriptor of the manifest
    /// itself, computed over its canonical bytes.
    ///
    /// # Errors
    /// - [`ManifestError::UnsupportedMediaType`] if no prefix matches
    /// - whatever the selected parse function returns
    pub fn dispatch(
        &self,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<(AnyManifest, Descriptor), ManifestError> {
        let (prefix, parse) = self
            .table
            .lookup(media_type)
            .ok_or_else(|| ManifestError::UnsupportedMediaType(media_type.to_string()))?;
        tracing::debug!(media_type, prefix, "dispatching manifest");

        let manifest = parse(bytes)?;
        let payload = manifest.payload()?;
        let descriptor =
            Descriptor::for_content_with(self.algorithm, payload.media_type, payload.bytes);
        Ok((manifest, descriptor))
    }

    /// True if some registered prefix matches `media_type`
    #[inline]
    #[must_use]
    pub fn supports(&self, media_type: &str) -> bool {
        self.table.lookup(media_type).is_some()
    }

    /// Registered prefixes in registration order
    #[must_use]
    pub fn prefixes(&self) -> Vec<&str> {
        self.table.prefixes()
    }

    /// Algorithm used for dispatch descriptors
    #[inline]
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
