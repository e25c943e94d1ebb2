//! In-memory blob store and repositories

use crate::blob::{BlobStore, Repository};
use crate::context::Context;
use crate::error::BlobError;
use cas_artifact::{Algorithm, Descriptor, Digest};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredBlob {
    descriptor: Descriptor,
    content: Arc<[u8]>,
}

/// Blob store held in a `RwLock`-guarded map
///
/// The first put of a digest fixes its media type; later puts of the same
/// content return the stored descriptor.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<Digest, StoredBlob>>,
    algorithm: Algorithm,
}

impl InMemoryBlobStore {
    /// Create empty store using SHA-256
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty store using `algorithm`
    #[inline]
    #[must_use]
    pub fn with_algorithm(algorithm: Algorithm) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            algorithm,
        }
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// True if `digest` is stored
    #[must_use]
    pub fn contains(&self, digest: &Digest) -> bool {
        self.blobs.read().contains_key(digest)
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(
        &self,
        ctx: &Context,
        media_type: &str,
        content: &[u8],
    ) -> Result<Descriptor, BlobError> {
        ctx.check()?;
        let descriptor = Descriptor::for_content_with(self.algorithm, media_type, content);
        let mut blobs = self.blobs.write();
        let stored = blobs
            .entry(*descriptor.digest())
            .or_insert_with(|| StoredBlob {
                descriptor,
                content: Arc::from(content),
            });
        Ok(stored.descriptor.clone())
    }

    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Vec<u8>, BlobError> {
        ctx.check()?;
        self.blobs
            .read()
            .get(digest)
            .map(|blob| blob.content.to_vec())
            .ok_or(BlobError::BlobUnknown(*digest))
    }

    async fn stat(&self, ctx: &Context, digest: &Digest) -> Result<Descriptor, BlobError> {
        ctx.check()?;
        self.blobs
            .read()
            .get(digest)
            .map(|blob| blob.descriptor.clone())
            .ok_or(BlobError::BlobUnknown(*digest))
    }

    async fn delete(&self, ctx: &Context, digest: &Digest) -> Result<(), BlobError> {
        ctx.check()?;
        self.blobs
            .write()
            .remove(digest)
            .map(|_| ())
            .ok_or(BlobError::BlobUnknown(*digest))
    }
}

/// Repository backed by an [`InMemoryBlobStore`]
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    name: String,
    blobs: Arc<InMemoryBlobStore>,
}

impl InMemoryRepository {
    /// Repository with its own empty store
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_store(name, Arc::new(InMemoryBlobStore::new()))
    }

    /// Repository over an existing store
    #[must_use]
    pub fn with_store(name: impl Into<String>, blobs: Arc<InMemoryBlobStore>) -> Self {
        Self {
            name: name.into(),
            blobs,
        }
    }

    /// Concrete store, for inspection
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<InMemoryBlobStore> {
        &self.blobs
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }
}

/// Named in-memory repositories sharing one digest algorithm
#[derive(Debug, Default)]
pub struct InMemoryNamespace {
    repositories: Mutex<HashMap<String, Arc<InMemoryRepository>>>,
    algorithm: Algorithm,
}

impl InMemoryNamespace {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_algorithm(algorithm: Algorithm) -> Self {
        Self {
            repositories: Mutex::new(HashMap::new()),
            algorithm,
        }
    }

    /// Repository `name`, created empty on first use
    #[must_use]
    pub fn repository(&self, name: &str) -> Arc<InMemoryRepository> {
        let algorithm = self.algorithm;
        self.repositories
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(InMemoryRepository::with_store(
                    name,
                    Arc::new(InMemoryBlobStore::with_algorithm(algorithm)),
                ))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_stat_and_get() {
        let ctx = Context::background();
        let store = InMemoryBlobStore::new();
        let desc = store.put(&ctx, "text/plain", b"hello").await.unwrap();

        assert_eq!(desc.digest(), &Digest::from_bytes(b"hello"));
        assert_eq!(store.stat(&ctx, desc.digest()).await.unwrap(), desc);
        assert_eq!(store.get(&ctx, desc.digest()).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let ctx = Context::background();
        let store = InMemoryBlobStore::new();
        let first = store.put(&ctx, "text/plain", b"same").await.unwrap();
        let second = store.put(&ctx, "text/plain", b"same").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_blob_is_unknown() {
        let ctx = Context::background();
        let store = InMemoryBlobStore::new();
        let digest = Digest::from_bytes(b"absent");
        assert!(store.stat(&ctx, &digest).await.unwrap_err().is_unknown());
        assert!(store.get(&ctx, &digest).await.unwrap_err().is_unknown());
        assert!(store.delete(&ctx, &digest).await.unwrap_err().is_unknown());
    }

    #[tokio::test]
    async fn delete_removes_blob() {
        let ctx = Context::background();
        let store = InMemoryBlobStore::new();
        let desc = store.put(&ctx, "text/plain", b"bye").await.unwrap();
        store.delete(&ctx, desc.digest()).await.unwrap();
        assert!(!store.contains(desc.digest()));
    }

    #[tokio::test]
    async fn canceled_context_is_rejected() {
        let ctx = Context::background();
        ctx.cancel();
        let store = InMemoryBlobStore::new();
        let result = store.put(&ctx, "text/plain", b"x").await;
        assert!(matches!(result, Err(BlobError::Canceled)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_uses_configured_algorithm() {
        let ctx = Context::background();
        let store = InMemoryBlobStore::with_algorithm(Algorithm::Blake3);
        let desc = store.put(&ctx, "text/plain", b"b3").await.unwrap();
        assert_eq!(desc.digest().algorithm(), Algorithm::Blake3);
    }

    #[test]
    fn namespace_reuses_repositories() {
        let namespace = InMemoryNamespace::new();
        let a = namespace.repository("test");
        let b = namespace.repository("test");
        let other = namespace.repository("other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(other.name(), "other");
    }
}
