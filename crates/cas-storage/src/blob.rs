//! Blob store and repository interfaces
//!
//! The manifest layer never touches storage directly: it reads and writes
//! through a [`BlobStore`] handle obtained from a [`Repository`].

use crate::context::Context;
use crate::error::BlobError;
use cas_artifact::{Descriptor, Digest};
use std::fmt::Debug;
use std::sync::Arc;

/// Content-addressable blob storage
///
/// # Contract
/// - `put` is idempotent: identical content yields the identical digest
/// - `stat`/`get`/`delete` of an absent digest fail with
///   [`BlobError::BlobUnknown`]
/// - calls made by one caller observe that caller's earlier puts and deletes
/// - a finished [`Context`] yields [`BlobError::Canceled`]
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Store `content` under its digest
    async fn put(&self, ctx: &Context, media_type: &str, content: &[u8])
        -> Result<Descriptor, BlobError>;

    /// Read the full content of a blob
    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Vec<u8>, BlobError>;

    /// Describe a blob without reading it
    async fn stat(&self, ctx: &Context, digest: &Digest) -> Result<Descriptor, BlobError>;

    /// Remove a blob
    async fn delete(&self, ctx: &Context, digest: &Digest) -> Result<(), BlobError>;
}

/// One named collection of artifacts
pub trait Repository: Send + Sync + Debug {
    /// Repository name
    fn name(&self) -> &str;

    /// Blob store scoped to this repository
    fn blobs(&self) -> Arc<dyn BlobStore>;
}
