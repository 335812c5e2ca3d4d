use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::ports::{
    BlobReader, Inspectable, MetadataIndex, ObjectStore, ObjectWriter, StorageError,
};
use crate::domain::value_objects::{HashAlgorithm, ObjectKey, ObjectMetadata};
use crate::infrastructure::storage::LocalFilesystemStore;

/// Filesystem store that also keeps per-object statistics in a
/// [`MetadataIndex`].
///
/// The index decides whether a key exists: a file on disk that the index
/// does not know about is reported as `NotFound`.
pub struct IndexedFilesystemStore {
    fs: LocalFilesystemStore,
    index: Arc<dyn MetadataIndex>,
    strict_download_accounting: bool,
}

impl IndexedFilesystemStore {
    pub fn new(fs: LocalFilesystemStore, index: Arc<dyn MetadataIndex>) -> Self {
        Self {
            fs,
            index,
            strict_download_accounting: false,
        }
    }

    /// Fail reads when the download counter cannot be bumped
    pub fn with_strict_download_accounting(mut self, strict: bool) -> Self {
        self.strict_download_accounting = strict;
        self
    }

    async fn ensure_known(&self, key: &ObjectKey) -> Result<(), StorageError> {
        if self.index.is_known(key).await? {
            Ok(())
        } else {
            Err(StorageError::NotFound(key.to_string()))
        }
    }
}

#[async_trait]
impl ObjectStore for IndexedFilesystemStore {
    async fn new_object_writer(&self) -> Result<Box<dyn ObjectWriter>, StorageError> {
        let inner = self.fs.new_object_writer().await?;
        Ok(Box::new(IndexedObjectWriter {
            inner,
            index: Arc::clone(&self.index),
        }))
    }

    async fn get(&self, key: &ObjectKey) -> Result<BlobReader, StorageError> {
        self.ensure_known(key).await?;
        let reader = self.fs.get(key).await?;

        if let Err(e) = self.index.increment_downloads(key).await {
            if self.strict_download_accounting {
                return Err(e.into());
            }
            warn!(key = %key, error = %e, "failed to record download, serving object anyway");
        }

        Ok(reader)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        self.ensure_known(key).await?;

        match self.fs.delete(key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                warn!(key = %key, "indexed object missing on disk, writing tombstone anyway");
            }
            Err(e) => return Err(e),
        }

        self.index.mark_removed(key, Utc::now()).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "indexed"
    }
}

#[async_trait]
impl Inspectable for IndexedFilesystemStore {
    async fn stat_all(&self) -> Result<Vec<ObjectMetadata>, StorageError> {
        Ok(self.index.list_all().await?)
    }
}

/// Filesystem writer that registers the object in the index after commit.
struct IndexedObjectWriter {
    inner: Box<dyn ObjectWriter>,
    index: Arc<dyn MetadataIndex>,
}

#[async_trait]
impl ObjectWriter for IndexedObjectWriter {
    fn expect_hash(&mut self, algorithm: HashAlgorithm, expected: String) {
        self.inner.expect_hash(algorithm, expected);
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, StorageError> {
        self.inner.write(buf).await
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn save(self: Box<Self>) -> Result<ObjectKey, StorageError> {
        let IndexedObjectWriter { inner, index } = *self;
        let size = inner.size();
        let key = inner.save().await?;

        // A live duplicate keeps its record and download count
        let metadata = ObjectMetadata::uploaded(key.as_hex(), size, Utc::now());
        if !index.record_upload(&metadata).await? {
            debug!(key = %key, "object already indexed");
        }

        Ok(key)
    }

    async fn remove(self: Box<Self>) -> Result<(), StorageError> {
        let IndexedObjectWriter { inner, .. } = *self;
        inner.remove().await
    }
}
