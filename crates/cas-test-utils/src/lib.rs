//! Testing utilities for CAS workspace
//!
//! Shared test helpers, fixtures, and fault-injecting stores.

#![allow(missing_docs)]

use cas_artifact::{Descriptor, Digest};
use cas_manifest::{AnyManifest, FormatRegistry, GenericManifest, ManifestBody, Versioned};
use cas_storage::{
    BlobError, BlobStore, Context, InMemoryNamespace, InMemoryRepository, ManifestService,
    Repository,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

pub const TEST_MEDIA_TYPE: &str = "x-application/test-data";

/// Generic manifest carrying one field the envelope knows nothing about
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TestManifest {
    #[serde(flatten)]
    pub body: ManifestBody,
    #[serde(default)]
    pub custom_field: String,
}

impl TestManifest {
    pub fn new(custom_field: &str) -> Self {
        Self {
            body: ManifestBody::new(Versioned::new(2, TEST_MEDIA_TYPE)),
            custom_field: custom_field.to_string(),
        }
    }

    pub fn with_reference(mut self, descriptor: Descriptor) -> Self {
        self.body = self.body.with_reference(descriptor);
        self
    }

    pub fn to_manifest(&self) -> AnyManifest {
        GenericManifest::from_value(self).unwrap().into()
    }
}

/// Service over a fresh in-memory repository named `test`
pub fn setup_service() -> (Arc<InMemoryRepository>, ManifestService) {
    let namespace = InMemoryNamespace::new();
    let repository = namespace.repository("test");
    let service = ManifestService::new(repository.clone(), FormatRegistry::global());
    (repository, service)
}

/// Store a small layer blob and return its descriptor
pub async fn put_layer(repository: &dyn Repository, content: &[u8]) -> Descriptor {
    repository
        .blobs()
        .put(&Context::background(), "application/octet-stream", content)
        .await
        .unwrap()
}

/// Blob store whose `stat` fails or never resolves for chosen digests
#[derive(Debug)]
pub struct FaultyBlobStore {
    inner: Arc<dyn BlobStore>,
    failing: RwLock<HashSet<Digest>>,
    stalled: RwLock<HashSet<Digest>>,
}

impl FaultyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            failing: RwLock::new(HashSet::new()),
            stalled: RwLock::new(HashSet::new()),
        }
    }

    /// Make every later `stat` of `digest` fail
    pub fn fail_stat(&self, digest: Digest) {
        self.failing.write().insert(digest);
    }

    /// Make every later `stat` of `digest` pend forever
    pub fn stall_stat(&self, digest: Digest) {
        self.stalled.write().insert(digest);
    }
}

#[async_trait::async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(
        &self,
        ctx: &Context,
        media_type: &str,
        content: &[u8],
    ) -> Result<Descriptor, BlobError> {
        self.inner.put(ctx, media_type, content).await
    }

    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Vec<u8>, BlobError> {
        self.inner.get(ctx, digest).await
    }

    async fn stat(&self, ctx: &Context, digest: &Digest) -> Result<Descriptor, BlobError> {
        if self.failing.read().contains(digest) {
            return Err(BlobError::Backend(format!("injected stat failure for {digest}")));
        }
        let stalled = self.stalled.read().contains(digest);
        if stalled {
            std::future::pending::<()>().await;
        }
        self.inner.stat(ctx, digest).await
    }

    async fn delete(&self, ctx: &Context, digest: &Digest) -> Result<(), BlobError> {
        self.inner.delete(ctx, digest).await
    }
}

/// Repository wrapping a [`FaultyBlobStore`]
#[derive(Debug)]
pub struct FaultyRepository {
    name: String,
    blobs: Arc<FaultyBlobStore>,
}

impl FaultyRepository {
    pub fn new(inner: &dyn Repository) -> Self {
        Self {
            name: inner.name().to_string(),
            blobs: Arc::new(FaultyBlobStore::new(inner.blobs())),
        }
    }

    pub fn faults(&self) -> &FaultyBlobStore {
        &self.blobs
    }
}

impl Repository for FaultyRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }
}
