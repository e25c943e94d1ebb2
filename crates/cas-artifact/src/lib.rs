//! CAS Artifact Primitives
//!
//! Content digests and blob descriptors shared by every layer of the
//! manifest store.
//!
//! # Core Concepts
//!
//! - [`Digest`]: `<algorithm>:<hex>` content identifier
//! - [`Algorithm`]: hash algorithm behind a digest (SHA-256 by default)
//! - [`Descriptor`]: `(digest, size, mediaType)` naming one stored blob
//!
//! # Example
//!
//! ```rust
//! use cas_artifact::{Descriptor, Digest};
//!
//! let desc = Descriptor::for_content("application/octet-stream", b"layer bytes");
//! assert_eq!(desc.digest(), &Digest::from_bytes(b"layer bytes"));
//! assert_eq!(desc.size(), 11);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod descriptor;
mod digest;

pub use descriptor::Descriptor;
pub use digest::{Algorithm, Digest, DigestError, MAX_DIGEST_LEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
