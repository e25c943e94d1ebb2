//! CAS Manifest Storage
//!
//! Puts, gets and deletes manifests in a repository's blob store, verifying
//! at put time that every referenced blob exists.
//!
//! # Core Concepts
//!
//! - [`BlobStore`] / [`Repository`]: the storage contract; in-memory and
//!   filesystem implementations are provided
//! - [`ManifestHandler`]: per-format unmarshal and put logic
//! - [`ManifestService`]: routes manifests to handlers by media type prefix
//! - [`Context`]: cancellation and deadlines for every operation
//!
//! # Example
//!
//! ```rust
//! use cas_manifest::FormatRegistry;
//! use cas_storage::{Context, InMemoryRepository, ManifestService, PutOptions};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let service = ManifestService::new(
//!     Arc::new(InMemoryRepository::new("library/app")),
//!     FormatRegistry::global(),
//! );
//! let ctx = Context::background();
//! let raw = br#"{"schemaVersion":2,"mediaType":"x-application/test-data"}"#;
//!
//! let digest = service
//!     .put_bytes(&ctx, "x-application/test-data", raw, PutOptions::new())
//!     .await?;
//! assert!(service.exists(&ctx, &digest).await?);
//! # Ok::<(), cas_storage::StorageError>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod blob;
mod config;
mod context;
mod error;
mod fs;
mod handler;
mod memory;
mod service;

pub use blob::{BlobStore, Repository};
pub use config::{StorageConfig, DEFAULT_VERIFY_CONCURRENCY};
pub use context::{Canceled, Context};
pub use error::{
    BlobError, ConfigError, ManifestVerificationError, StorageError, VerificationError,
};
pub use fs::{FsBlobStore, FsRepository};
pub use handler::{GenericManifestHandler, ManifestHandler};
pub use memory::{InMemoryBlobStore, InMemoryNamespace, InMemoryRepository};
pub use service::{ManifestService, PutOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
