//! ManifestService Tests
//!
//! End-to-end put/get/delete against in-memory and filesystem repositories.
//!
use cas_artifact::{Descriptor, Digest};
use cas_manifest::{AnyManifest, FormatRegistry, Manifest, ManifestError, Payload, Versioned};
use cas_storage::{
    BlobError, Context, FsRepository, ManifestHandler, ManifestService, PutOptions, Repository,
    StorageConfig, StorageError, VerificationError,
};
use cas_test_utils::{put_layer, setup_service, FaultyRepository, TestManifest, TEST_MEDIA_TYPE};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_custom_field_survives_round_trip() {
    let (_repo, service) = setup_service();
    let ctx = Context::background();
    let manifest = TestManifest::new("test").to_manifest();

    let digest = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();
    let stored = service.get(&ctx, &digest).await.unwrap();

    let payload = stored.payload().unwrap();
    assert_eq!(payload.media_type, TEST_MEDIA_TYPE);
    assert_eq!(payload.bytes, manifest.payload().unwrap().bytes);

    let decoded: TestManifest = stored.as_generic().unwrap().decode().unwrap();
    assert_eq!(decoded.custom_field, "test");
}

#[tokio::test]
async fn test_digest_is_hash_of_canonical_bytes() {
    let (_repo, service) = setup_service();
    let ctx = Context::background();
    let manifest = TestManifest::new("stable").to_manifest();

    let first = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();
    let second = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, Digest::from_bytes(manifest.payload().unwrap().bytes));
}

#[tokio::test]
async fn test_put_bytes_preserves_original_formatting() {
    let (_repo, service) = setup_service();
    let ctx = Context::background();
    let raw = b"{ \"mediaType\" : \"x-application/test-data\",\n\t\"schemaVersion\": 2, \"extra\": [1,2] }";

    let digest = service
        .put_bytes(&ctx, TEST_MEDIA_TYPE, raw, PutOptions::new())
        .await
        .unwrap();
    assert_eq!(digest, Digest::from_bytes(raw));

    let stored = service.get(&ctx, &digest).await.unwrap();
    assert_eq!(stored.payload().unwrap().bytes, raw);
}

#[tokio::test]
async fn test_unregistered_prefix_is_rejected() {
    let (repo, service) = setup_service();
    let result = service
        .put_bytes(
            &Context::background(),
            "application/vnd.other+json",
            br#"{"mediaType":"application/vnd.other+json"}"#,
            PutOptions::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(StorageError::Manifest(ManifestError::UnsupportedMediaType(_)))
    ));
    assert!(repo.store().is_empty());
}

#[tokio::test]
async fn test_dangling_reference_fails_and_stores_nothing() {
    let (_repo, service) = setup_service();
    let ctx = Context::background();
    let missing = Descriptor::for_content("application/octet-stream", b"never uploaded");
    let manifest = TestManifest::new("x").with_reference(missing.clone()).to_manifest();

    let err = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap_err();
    let verification = err.as_verification().expect("verification error");
    assert_eq!(verification.dangling_digests(), vec![*missing.digest()]);

    let would_be = Digest::from_bytes(manifest.payload().unwrap().bytes);
    assert!(matches!(
        service.get(&ctx, &would_be).await,
        Err(StorageError::ManifestUnknown(_))
    ));
}

#[tokio::test]
async fn test_store_failure_reports_both_errors() {
    let (repo, _service) = setup_service();
    let ctx = Context::background();
    let layer = put_layer(repo.as_ref(), b"layer").await;

    let faulty = Arc::new(FaultyRepository::new(repo.as_ref()));
    faulty.faults().fail_stat(*layer.digest());
    let service = ManifestService::new(faulty, FormatRegistry::global());

    let manifest = TestManifest::new("x").with_reference(layer.clone()).to_manifest();
    let err = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap_err();
    let errors = err.as_verification().unwrap().errors();

    assert_eq!(errors.len(), 2);
    assert!(matches!(&errors[0], VerificationError::Store(BlobError::Backend(_))));
    assert_eq!(errors[1].dangling_digest(), Some(layer.digest()));
}

#[tokio::test]
async fn test_skip_verification_commits_dangling_manifest() {
    let (repo, service) = setup_service();
    let ctx = Context::background();
    let missing = Descriptor::for_content("application/octet-stream", b"restore later");
    let manifest = TestManifest::new("x").with_reference(missing).to_manifest();

    let digest = service
        .put(&ctx, &manifest, PutOptions::new().skip_dependency_verification())
        .await
        .unwrap();
    assert!(repo.store().contains(&digest));

    // reads never verify
    let stored = service.get(&ctx, &digest).await.unwrap();
    assert_eq!(stored.references().len(), 1);
}

#[tokio::test]
async fn test_reput_after_manifest_and_reference_deleted_fails() {
    let (repo, service) = setup_service();
    let ctx = Context::background();
    let layer = put_layer(repo.as_ref(), b"").await;
    let manifest = TestManifest::new("x").with_reference(layer.clone()).to_manifest();

    let digest = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();
    service.delete(&ctx, &digest).await.unwrap();
    repo.blobs().delete(&ctx, layer.digest()).await.unwrap();

    let err = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap_err();
    assert_eq!(
        err.as_verification().unwrap().dangling_digests(),
        vec![*layer.digest()]
    );
}

#[tokio::test]
async fn test_stored_manifest_is_reverified_on_reput() {
    let (repo, service) = setup_service();
    let ctx = Context::background();
    let layer = put_layer(repo.as_ref(), b"").await;
    let manifest = TestManifest::new("x").with_reference(layer.clone()).to_manifest();

    let digest = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();
    repo.blobs().delete(&ctx, layer.digest()).await.unwrap();
    assert!(service.exists(&ctx, &digest).await.unwrap());

    let err = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap_err();
    assert_eq!(
        err.as_verification().unwrap().dangling_digests(),
        vec![*layer.digest()]
    );
}

#[tokio::test]
async fn test_sha512_reference_is_verified_at_put() {
    let (repo, service) = setup_service();
    let ctx = Context::background();
    let missing = cas_artifact::Algorithm::Sha512.digest(b"elsewhere");
    let raw = format!(
        r#"{{"schemaVersion":2,"mediaType":"x-application/test-data","references":[{{"digest":"{missing}"}}]}}"#
    );

    let err = service
        .put_bytes(&ctx, TEST_MEDIA_TYPE, raw.as_bytes(), PutOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.as_verification().unwrap().dangling_digests(), vec![missing]);
    assert!(repo.store().is_empty());
}

#[tokio::test]
async fn test_null_references_document_round_trips() {
    let (_repo, service) = setup_service();
    let ctx = Context::background();
    let raw = b"{\n   \"schemaVersion\": 2,\n   \"mediaType\": \"x-application/test-data\",\n   \"references\": null\n}";

    let digest = service
        .put_bytes(&ctx, TEST_MEDIA_TYPE, raw, PutOptions::new())
        .await
        .unwrap();
    let stored = service.get(&ctx, &digest).await.unwrap();
    assert_eq!(stored.payload().unwrap().bytes, raw);
    assert!(stored.references().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_verification_commits_nothing() {
    let (repo, _service) = setup_service();
    let ctx = Context::background();
    let layer = put_layer(repo.as_ref(), b"slow layer").await;

    let faulty = Arc::new(FaultyRepository::new(repo.as_ref()));
    faulty.faults().stall_stat(*layer.digest());
    let service = ManifestService::new(faulty, FormatRegistry::global());
    let manifest = TestManifest::new("x").with_reference(layer).to_manifest();

    let canceler = ctx.clone();
    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceler.cancel();
    });

    let result = service.put(&ctx, &manifest, PutOptions::new()).await;
    cancel.await.unwrap();

    assert!(matches!(result, Err(StorageError::Canceled)));
    let would_be = Digest::from_bytes(manifest.payload().unwrap().bytes);
    assert!(!repo.store().contains(&would_be));
    assert_eq!(repo.store().len(), 1);
}

#[tokio::test]
async fn test_canceled_context_aborts_put() {
    let (repo, service) = setup_service();
    let ctx = Context::background();
    let layer = put_layer(repo.as_ref(), b"layer").await;
    let manifest = TestManifest::new("x").with_reference(layer).to_manifest();

    let child = ctx.child();
    ctx.cancel();
    let result = service.put(&child, &manifest, PutOptions::new()).await;

    assert!(matches!(result, Err(StorageError::Canceled)));
    assert_eq!(repo.store().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_deadline_aborts_put() {
    let (_repo, service) = setup_service();
    let ctx = Context::background().with_timeout(Duration::from_millis(10));
    tokio::time::advance(Duration::from_millis(20)).await;

    let manifest = TestManifest::new("late").to_manifest();
    let result = service.put(&ctx, &manifest, PutOptions::new()).await;
    assert!(result.unwrap_err().is_canceled());
}

#[tokio::test]
async fn test_filesystem_repository_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::default().with_root(dir.path());
    let repository = Arc::new(FsRepository::open(&config, "library/app").unwrap());
    let service = ManifestService::from_config(repository.clone(), FormatRegistry::global(), &config);
    let ctx = Context::background();

    let layer = put_layer(repository.as_ref(), b"layer on disk").await;
    let manifest = TestManifest::new("fs").with_reference(layer).to_manifest();
    let digest = service.put(&ctx, &manifest, PutOptions::new()).await.unwrap();

    let stored = service.get(&ctx, &digest).await.unwrap();
    assert_eq!(stored.payload().unwrap().bytes, manifest.payload().unwrap().bytes);
    assert!(dir.path().join("repositories/library/app/blobs/sha256").is_dir());
}

// Extension format: JSON notes under `vnd.test.note/`

const NOTE_PREFIX: &str = "vnd.test.note/";

#[derive(Debug)]
struct NoteManifest {
    media_type: String,
    bytes: Vec<u8>,
}

impl NoteManifest {
    fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let header = Versioned::peek(bytes)?;
        if !header.media_type.starts_with(NOTE_PREFIX) {
            return Err(ManifestError::media_type_mismatch(NOTE_PREFIX, header.media_type));
        }
        Ok(Self {
            media_type: header.media_type,
            bytes: bytes.to_vec(),
        })
    }
}

impl Manifest for NoteManifest {
    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn references(&self) -> &[Descriptor] {
        &[]
    }

    fn payload(&self) -> Result<Payload<'_>, ManifestError> {
        Ok(Payload {
            media_type: &self.media_type,
            bytes: &self.bytes,
        })
    }
}

#[derive(Debug)]
struct NoteHandler {
    repository: Arc<dyn Repository>,
}

#[async_trait::async_trait]
impl ManifestHandler for NoteHandler {
    async fn unmarshal(
        &self,
        _ctx: &Context,
        _digest: &Digest,
        content: &[u8],
    ) -> Result<AnyManifest, StorageError> {
        Ok(AnyManifest::extension(NoteManifest::parse(content)?))
    }

    async fn put(
        &self,
        ctx: &Context,
        manifest: &AnyManifest,
        _skip_dependency_verification: bool,
    ) -> Result<Digest, StorageError> {
        let payload = manifest.payload()?;
        let descriptor = self
            .repository
            .blobs()
            .put(ctx, payload.media_type, payload.bytes)
            .await
            .map_err(|source| StorageError::Commit { source })?;
        Ok(*descriptor.digest())
    }
}

#[tokio::test]
async fn test_extension_format_with_custom_handler() {
    let (repo, _service) = setup_service();
    let mut builder = cas_manifest::FormatRegistryBuilder::with_defaults();
    builder
        .register(NOTE_PREFIX, |bytes: &[u8]| {
            NoteManifest::parse(bytes).map(AnyManifest::extension)
        })
        .unwrap();
    let formats = Arc::new(builder.build());

    let mut service = ManifestService::new(repo.clone(), formats);
    service
        .register_handler(NOTE_PREFIX, Arc::new(NoteHandler { repository: repo.clone() }))
        .unwrap();

    let ctx = Context::background();
    let raw = br#"{"mediaType":"vnd.test.note/v1","text":"hello"}"#;
    let digest = service
        .put_bytes(&ctx, "vnd.test.note/v1", raw, PutOptions::new())
        .await
        .unwrap();

    let stored = service.get(&ctx, &digest).await.unwrap();
    assert_eq!(stored.kind(), "extension");
    assert_eq!(stored.payload().unwrap().bytes, raw);

    // generic manifests still route to the generic handler
    let generic = TestManifest::new("still works").to_manifest();
    assert!(service.put(&ctx, &generic, PutOptions::new()).await.is_ok());
}
