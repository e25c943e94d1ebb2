//! Manifest handlers
//!
//! A handler owns one manifest kind: it turns stored bytes back into a
//! manifest and commits new manifests into the repository's blob store.
//!
//! # Put stages
//!
//! [`GenericManifestHandler::put`] runs these in order; each one can end the
//! put:
//!
//! 1. type check: only [`AnyManifest::Generic`] is accepted
//! 2. verify: every referenced blob must exist (unless skipped)
//! 3. commit: canonical bytes go to the blob store under the manifest's
//!    media type
//! 4. the store-assigned digest is returned
//!
//! Verification is all-or-nothing and never short-circuits: every distinct
//! reference is checked and all failures are returned in one
//! [`ManifestVerificationError`]. Nothing is committed unless verification
//! finished successfully.

use crate::blob::{BlobStore, Repository};
use crate::config::DEFAULT_VERIFY_CONCURRENCY;
use crate::context::Context;
use crate::error::{BlobError, ManifestVerificationError, StorageError, VerificationError};
use cas_artifact::{Descriptor, Digest};
use cas_manifest::{AnyManifest, GenericManifest, Manifest};
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Per-format read and write logic
#[async_trait::async_trait]
pub trait ManifestHandler: Send + Sync + Debug {
    /// Parse stored bytes; never verifies references
    async fn unmarshal(
        &self,
        ctx: &Context,
        digest: &Digest,
        content: &[u8],
    ) -> Result<AnyManifest, StorageError>;

    /// Verify and commit `manifest`, returning its digest
    async fn put(
        &self,
        ctx: &Context,
        manifest: &AnyManifest,
        skip_dependency_verification: bool,
    ) -> Result<Digest, StorageError>;
}

/// Handler for the generic `x-application/` format
#[derive(Debug, Clone)]
pub struct GenericManifestHandler {
    repository: Arc<dyn Repository>,
    verify_concurrency: usize,
}

impl GenericManifestHandler {
    /// Handler storing into `repository`
    #[must_use]
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            repository,
            verify_concurrency: DEFAULT_VERIFY_CONCURRENCY,
        }
    }

    /// Reference checks in flight per put (at least 1)
    #[inline]
    #[must_use]
    pub fn with_verify_concurrency(mut self, concurrency: usize) -> Self {
        self.verify_concurrency = concurrency.max(1);
        self
    }

    /// Check that every referenced blob exists
    ///
    /// Duplicate references are checked once. A store failure other than
    /// "blob unknown" is reported together with a dangling reference for
    /// the same digest.
    async fn verify_manifest(
        &self,
        ctx: &Context,
        manifest: &GenericManifest,
        skip_dependency_verification: bool,
    ) -> Result<(), StorageError> {
        if skip_dependency_verification {
            tracing::debug!(media_type = manifest.media_type(), "skipping dependency verification");
            return Ok(());
        }

        let blobs = self.repository.blobs();
        let blobs: &dyn BlobStore = blobs.as_ref();
        let digests: IndexSet<Digest> = manifest
            .references()
            .iter()
            .map(|descriptor| *descriptor.digest())
            .collect();

        let checks = stream::iter(digests)
            .map(move |digest| async move { (digest, blobs.stat(ctx, &digest).await) })
            .buffered(self.verify_concurrency)
            .collect::<Vec<(Digest, Result<Descriptor, BlobError>)>>();
        let results = ctx.run(checks).await?;

        let mut errors = Vec::new();
        for (digest, result) in results {
            match result {
                Ok(_) => {}
                Err(BlobError::Canceled) => return Err(StorageError::Canceled),
                Err(BlobError::BlobUnknown(_)) => {
                    tracing::warn!(%digest, "manifest references unknown blob");
                    errors.push(VerificationError::DanglingReference { digest });
                }
                Err(err) => {
                    tracing::warn!(%digest, error = %err, "failed to verify manifest reference");
                    errors.push(VerificationError::Store(err));
                    errors.push(VerificationError::DanglingReference { digest });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestVerificationError::new(errors).into())
        }
    }
}

#[async_trait::async_trait]
impl ManifestHandler for GenericManifestHandler {
    async fn unmarshal(
        &self,
        _ctx: &Context,
        digest: &Digest,
        content: &[u8],
    ) -> Result<AnyManifest, StorageError> {
        tracing::debug!(%digest, "GenericManifestHandler::unmarshal");
        let manifest = GenericManifest::from_bytes(content)?;
        Ok(AnyManifest::Generic(manifest))
    }

    async fn put(
        &self,
        ctx: &Context,
        manifest: &AnyManifest,
        skip_dependency_verification: bool,
    ) -> Result<Digest, StorageError> {
        tracing::debug!(
            repository = self.repository.name(),
            media_type = manifest.media_type(),
            "GenericManifestHandler::put"
        );

        let AnyManifest::Generic(generic) = manifest else {
            return Err(StorageError::WrongHandler {
                expected: "generic",
                actual: manifest.kind(),
                media_type: manifest.media_type().to_string(),
            });
        };

        self.verify_manifest(ctx, generic, skip_dependency_verification)
            .await?;
        ctx.check()?;

        let payload = generic.payload()?;
        let descriptor = self
            .repository
            .blobs()
            .put(ctx, payload.media_type, payload.bytes)
            .await
            .map_err(|source| match source {
                BlobError::Canceled => StorageError::Canceled,
                source => {
                    tracing::error!(error = %source, "error putting payload into blob store");
                    StorageError::Commit { source }
                }
            })?;

        Ok(*descriptor.digest())
    }
}
