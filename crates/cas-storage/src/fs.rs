//! Filesystem blob store
//!
//! Layout under the store root:
//!
//! ```text
//! blobs/<algorithm>/<first two hex chars>/<hex>/data       blob content
//! blobs/<algorithm>/<first two hex chars>/<hex>/meta.json  descriptor
//! ```
//!
//! Files are written to a uniquely named temporary file in the same
//! directory and renamed into place, so readers never see partial content.
//! Both files are written by one task on the blocking pool that runs to
//! completion even if the put is canceled, so a canceled put leaves either
//! nothing or a complete blob. A temporary file whose write failed is
//! removed.
//! `meta.json` is written before `data`; a blob exists once `data` does. A
//! `meta.json` left without `data` (crash, full disk) reads as unknown and
//! the next put of the same content overwrites it.

use crate::blob::{BlobStore, Repository};
use crate::config::StorageConfig;
use crate::context::Context;
use crate::error::{BlobError, StorageError};
use cas_artifact::{Algorithm, Descriptor, Digest};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const DATA_FILE: &str = "data";
const META_FILE: &str = "meta.json";

/// Blob store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    algorithm: Algorithm,
}

impl FsBlobStore {
    /// Store rooted at `root` using SHA-256
    ///
    /// The directory is created lazily on first put.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            algorithm: Algorithm::default(),
        }
    }

    /// Use `algorithm` for new blobs
    #[inline]
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_dir(&self, digest: &Digest) -> PathBuf {
        let hex = digest.hex();
        self.root
            .join("blobs")
            .join(digest.algorithm().as_str())
            .join(&hex[..2])
            .join(hex)
    }

    async fn read_meta(&self, digest: &Digest) -> Result<Descriptor, BlobError> {
        let path = self.blob_dir(digest).join(META_FILE);
        let data_path = self.blob_dir(digest).join(DATA_FILE);
        if !exists(&data_path).await? {
            return Err(BlobError::BlobUnknown(*digest));
        }
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BlobError::BlobUnknown(*digest)),
            Err(e) => return Err(BlobError::io_error(path, e)),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_blob(&self, descriptor: &Descriptor, content: &[u8]) -> Result<(), BlobError> {
        let dir = self.blob_dir(descriptor.digest());
        let meta = serde_json::to_vec(descriptor)?;
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| BlobError::io_error(&dir, e))?;
            write_atomic(&dir.join(META_FILE), &meta)?;
            write_atomic(&dir.join(DATA_FILE), &content)
        })
        .await
        .map_err(|e| BlobError::Backend(format!("blob writer task failed: {e}")))?
    }
}

async fn exists(path: &Path) -> Result<bool, BlobError> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BlobError::io_error(path, e)),
    }
}

/// Temporary file deleted on drop unless persisted
#[derive(Debug)]
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn next_to(target: &Path) -> Self {
        Self {
            path: target.with_extension(format!("{}.tmp", uuid::Uuid::new_v4())),
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persist(mut self, target: &Path) -> Result<(), BlobError> {
        std::fs::rename(&self.path, target).map_err(|e| BlobError::io_error(target, e))?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temporary blob file");
            }
        }
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), BlobError> {
    let tmp = TempFile::next_to(path);
    std::fs::write(tmp.path(), content).map_err(|e| BlobError::io_error(tmp.path(), e))?;
    tmp.persist(path)
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        ctx: &Context,
        media_type: &str,
        content: &[u8],
    ) -> Result<Descriptor, BlobError> {
        let descriptor = Descriptor::for_content_with(self.algorithm, media_type, content);
        ctx.run(async {
            match self.read_meta(descriptor.digest()).await {
                Ok(existing) => Ok(existing),
                Err(BlobError::BlobUnknown(_)) => {
                    self.write_blob(&descriptor, content).await?;
                    tracing::debug!(digest = %descriptor.digest(), size = descriptor.size(), "stored blob");
                    Ok(descriptor.clone())
                }
                Err(e) => Err(e),
            }
        })
        .await?
    }

    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Vec<u8>, BlobError> {
        ctx.run(async {
            let path = self.blob_dir(digest).join(DATA_FILE);
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(BlobError::BlobUnknown(*digest))
                }
                Err(e) => return Err(BlobError::io_error(path, e)),
            };
            if !digest.verify(&content) {
                tracing::error!(%digest, "stored blob does not match its digest");
                return Err(BlobError::Corrupt(*digest));
            }
            Ok(content)
        })
        .await?
    }

    async fn stat(&self, ctx: &Context, digest: &Digest) -> Result<Descriptor, BlobError> {
        ctx.run(self.read_meta(digest)).await?
    }

    async fn delete(&self, ctx: &Context, digest: &Digest) -> Result<(), BlobError> {
        ctx.run(async {
            let dir = self.blob_dir(digest);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::BlobUnknown(*digest)),
                Err(e) => Err(BlobError::io_error(dir, e)),
            }
        })
        .await?
    }
}

/// Repository stored under `<root>/repositories/<name>`
#[derive(Debug, Clone)]
pub struct FsRepository {
    name: String,
    blobs: Arc<FsBlobStore>,
}

impl FsRepository {
    /// Open repository `name` under the configured root
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidRepositoryName`] for empty names and
    /// names that would escape the root (absolute paths, `..`)
    pub fn open(config: &StorageConfig, name: &str) -> Result<Self, StorageError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && !name.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidRepositoryName(name.to_string()));
        }

        let store = FsBlobStore::new(config.root.join("repositories").join(relative))
            .with_algorithm(config.digest_algorithm);
        Ok(Self {
            name: name.to_string(),
            blobs: Arc::new(store),
        })
    }

    /// Concrete store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<FsBlobStore> {
        &self.blobs
    }
}

impl Repository for FsRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }
}
