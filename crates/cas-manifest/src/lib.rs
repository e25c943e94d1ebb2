//! CAS Manifest Formats
//!
//! Byte-preserving manifest envelopes and the media type prefix registry
//! that routes raw documents to the format that owns them.
//!
//! # Core Concepts
//!
//! - [`GenericManifest`]: the `x-application/` envelope; canonical bytes plus
//!   a parsed view of `schemaVersion`, `mediaType` and `references`
//! - [`Manifest`]: what the storage layer needs from any format
//! - [`AnyManifest`]: tagged union over built-in and third-party formats
//! - [`FormatRegistry`]: frozen `(prefix → parse function)` table
//!
//! # Example
//!
//! ```rust
//! use cas_manifest::{FormatRegistry, Manifest};
//!
//! let registry = FormatRegistry::with_defaults();
//! let raw = br#"{"schemaVersion":2,"mediaType":"x-application/test-data"}"#;
//! let (manifest, descriptor) = registry.dispatch("x-application/test-data", raw)?;
//!
//! assert_eq!(manifest.payload()?.bytes, raw);
//! assert_eq!(descriptor.size(), raw.len() as u64);
//! # Ok::<(), cas_manifest::ManifestError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod generic;
mod manifest;
mod prefix;
mod registry;
mod versioned;

pub use error::ManifestError;
pub use generic::{GenericManifest, ManifestBody, GENERIC_MEDIA_TYPE_PREFIX};
pub use manifest::{AnyManifest, Manifest, Payload};
pub use prefix::PrefixTable;
pub use registry::{FormatRegistry, FormatRegistryBuilder, ParseFn};
pub use versioned::Versioned;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
