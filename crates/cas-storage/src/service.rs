//! Repository-scoped manifest service
//!
//! Routes manifests to the handler that owns their media type prefix. The
//! generic handler is registered for `x-application/` out of the box;
//! further handlers are added with [`ManifestService::register_handler`]
//! before the service is shared.

use crate::blob::Repository;
use crate::config::StorageConfig;
use crate::context::Context;
use crate::error::{BlobError, StorageError};
use crate::handler::{GenericManifestHandler, ManifestHandler};
use cas_artifact::Digest;
use cas_manifest::{AnyManifest, FormatRegistry, ManifestError, PrefixTable, Versioned};
use std::sync::Arc;

/// Options for [`ManifestService::put`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    skip_dependency_verification: bool,
}

impl PutOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit without checking references (trusted bulk restore only)
    #[inline]
    #[must_use]
    pub fn skip_dependency_verification(mut self) -> Self {
        self.skip_dependency_verification = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn skips_verification(&self) -> bool {
        self.skip_dependency_verification
    }
}

/// Manifest get/put/delete for one repository
#[derive(Debug)]
pub struct ManifestService {
    repository: Arc<dyn Repository>,
    formats: Arc<FormatRegistry>,
    handlers: PrefixTable<Arc<dyn ManifestHandler>>,
}

impl ManifestService {
    /// Service with the generic handler and default settings
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>, formats: Arc<FormatRegistry>) -> Self {
        Self::from_config(repository, formats, &StorageConfig::default())
    }

    /// Service with the generic handler tuned by `config`
    #[must_use]
    pub fn from_config(
        repository: Arc<dyn Repository>,
        formats: Arc<FormatRegistry>,
        config: &StorageConfig,
    ) -> Self {
        let generic: Arc<dyn ManifestHandler> = Arc::new(
            GenericManifestHandler::new(Arc::clone(&repository))
                .with_verify_concurrency(config.effective_verify_concurrency()),
        );
        Self {
            repository,
            formats,
            handlers: PrefixTable::with_generic(generic),
        }
    }

    /// Route media types starting with `prefix` to `handler`
    ///
    /// # Errors
    /// Returns [`ManifestError::DuplicateRegistration`] if `prefix`
    /// overlaps a registered prefix
    pub fn register_handler(
        &mut self,
        prefix: &str,
        handler: Arc<dyn ManifestHandler>,
    ) -> Result<&mut Self, StorageError> {
        self.handlers.insert(prefix, handler)?;
        tracing::debug!(prefix, repository = self.repository.name(), "registered manifest handler");
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    #[inline]
    #[must_use]
    pub fn formats(&self) -> &Arc<FormatRegistry> {
        &self.formats
    }

    fn handler_for(&self, media_type: &str) -> Result<&Arc<dyn ManifestHandler>, StorageError> {
        self.handlers
            .lookup(media_type)
            .map(|(_, handler)| handler)
            .ok_or_else(|| ManifestError::UnsupportedMediaType(media_type.to_string()).into())
    }

    /// Verify and commit a parsed manifest
    ///
    /// # Errors
    /// - [`ManifestError::UnsupportedMediaType`] if no handler owns the media type
    /// - whatever the owning handler's put returns
    pub async fn put(
        &self,
        ctx: &Context,
        manifest: &AnyManifest,
        options: PutOptions,
    ) -> Result<Digest, StorageError> {
        let media_type = cas_manifest::Manifest::media_type(manifest);
        let handler = self.handler_for(media_type)?;
        let digest = handler
            .put(ctx, manifest, options.skips_verification())
            .await?;
        tracing::info!(%digest, media_type, repository = self.repository.name(), "stored manifest");
        Ok(digest)
    }

    /// Parse raw bytes with the registered format, then [`put`](Self::put)
    ///
    /// # Errors
    /// Parse and dispatch errors are returned unmodified, followed by
    /// whatever [`put`](Self::put) returns
    pub async fn put_bytes(
        &self,
        ctx: &Context,
        media_type: &str,
        content: &[u8],
        options: PutOptions,
    ) -> Result<Digest, StorageError> {
        let (manifest, descriptor) = self.formats.dispatch(media_type, content)?;
        let digest = self.put(ctx, &manifest, options).await?;
        if digest != *descriptor.digest() {
            tracing::debug!(
                committed = %digest,
                computed = %descriptor.digest(),
                "blob store and format registry use different digest algorithms"
            );
        }
        Ok(digest)
    }

    /// Fetch and parse a stored manifest
    ///
    /// # Errors
    /// - [`StorageError::ManifestUnknown`] if nothing is stored under `digest`
    /// - [`ManifestError::UnsupportedMediaType`] if no handler owns the stored media type
    pub async fn get(&self, ctx: &Context, digest: &Digest) -> Result<AnyManifest, StorageError> {
        let content = self
            .repository
            .blobs()
            .get(ctx, digest)
            .await
            .map_err(|source| fetch_error(*digest, source))?;

        let header = Versioned::peek(&content)?;
        tracing::debug!(%digest, media_type = %header.media_type, schema_version = header.schema_version, "loaded manifest");
        let handler = self.handler_for(&header.media_type)?;
        handler.unmarshal(ctx, digest, &content).await
    }

    /// True if a blob is stored under `digest`
    ///
    /// # Errors
    /// Store failures other than "blob unknown"
    pub async fn exists(&self, ctx: &Context, digest: &Digest) -> Result<bool, StorageError> {
        match self.repository.blobs().stat(ctx, digest).await {
            Ok(_) => Ok(true),
            Err(BlobError::BlobUnknown(_)) => Ok(false),
            Err(BlobError::Canceled) => Err(StorageError::Canceled),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored manifest
    ///
    /// Referenced blobs are left alone.
    ///
    /// # Errors
    /// [`StorageError::ManifestUnknown`] if nothing is stored under `digest`
    pub async fn delete(&self, ctx: &Context, digest: &Digest) -> Result<(), StorageError> {
        match self.repository.blobs().delete(ctx, digest).await {
            Ok(()) => {
                tracing::info!(%digest, repository = self.repository.name(), "deleted manifest");
                Ok(())
            }
            Err(BlobError::BlobUnknown(_)) => Err(StorageError::ManifestUnknown(*digest)),
            Err(BlobError::Canceled) => Err(StorageError::Canceled),
            Err(e) => Err(e.into()),
        }
    }
}

fn fetch_error(digest: Digest, source: BlobError) -> StorageError {
    match source {
        BlobError::BlobUnknown(_) => StorageError::ManifestUnknown(digest),
        BlobError::Canceled => StorageError::Canceled,
        source => StorageError::Fetch { digest, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;

    fn service() -> ManifestService {
        ManifestService::new(
            Arc::new(InMemoryRepository::new("test")),
            FormatRegistry::global(),
        )
    }

    const RAW: &[u8] = b"{\n  \"schemaVersion\": 2,\n  \"mediaType\": \"x-application/test-data\"\n}";

    #[tokio::test]
    async fn put_bytes_then_get() {
        let svc = service();
        let ctx = Context::background();
        let digest = svc
            .put_bytes(&ctx, "x-application/test-data", RAW, PutOptions::new())
            .await
            .unwrap();
        assert_eq!(digest, Digest::from_bytes(RAW));

        let stored = svc.get(&ctx, &digest).await.unwrap();
        let payload = cas_manifest::Manifest::payload(&stored).unwrap();
        assert_eq!(payload.bytes, RAW);
        assert_eq!(payload.media_type, "x-application/test-data");
    }

    #[tokio::test]
    async fn get_unknown_digest() {
        let svc = service();
        let digest = Digest::from_bytes(b"never stored");
        let result = svc.get(&Context::background(), &digest).await;
        assert!(matches!(result, Err(StorageError::ManifestUnknown(d)) if d == digest));
    }

    #[tokio::test]
    async fn get_unroutable_blob() {
        let svc = service();
        let ctx = Context::background();
        let desc = svc
            .repository()
            .blobs()
            .put(&ctx, "application/json", br#"{"mediaType":"application/json"}"#)
            .await
            .unwrap();
        let result = svc.get(&ctx, desc.digest()).await;
        assert!(matches!(
            result,
            Err(StorageError::Manifest(ManifestError::UnsupportedMediaType(_)))
        ));
    }

    #[tokio::test]
    async fn put_bytes_unregistered_media_type() {
        let svc = service();
        let result = svc
            .put_bytes(&Context::background(), "vnd.unknown/thing", RAW, PutOptions::new())
            .await;
        assert!(matches!(
            result,
            Err(StorageError::Manifest(ManifestError::UnsupportedMediaType(_)))
        ));
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let svc = service();
        let ctx = Context::background();
        let digest = svc
            .put_bytes(&ctx, "x-application/test-data", RAW, PutOptions::new())
            .await
            .unwrap();

        assert!(svc.exists(&ctx, &digest).await.unwrap());
        svc.delete(&ctx, &digest).await.unwrap();
        assert!(!svc.exists(&ctx, &digest).await.unwrap());
        assert!(matches!(
            svc.delete(&ctx, &digest).await,
            Err(StorageError::ManifestUnknown(_))
        ));
    }

    #[test]
    fn register_handler_rejects_overlap() {
        let mut svc = service();
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new("other"));
        let handler: Arc<dyn ManifestHandler> = Arc::new(GenericManifestHandler::new(repo));
        let result = svc.register_handler("x-application/special", handler);
        assert!(matches!(
            result,
            Err(StorageError::Manifest(ManifestError::DuplicateRegistration { .. }))
        ));
    }

    #[test]
    fn put_options_builder() {
        assert!(!PutOptions::new().skips_verification());
        assert!(PutOptions::new().skip_dependency_verification().skips_verification());
    }
}
