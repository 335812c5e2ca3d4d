use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::application::ports::{BlobReader, ObjectStore, ObjectWriter, StorageError};
use crate::domain::value_objects::{HashAlgorithm, ObjectKey};
use crate::infrastructure::storage::DigestSet;

type ObjectMap = Arc<RwLock<HashMap<ObjectKey, Bytes>>>;

/// Volatile object store for tests and ephemeral deployments.
///
/// Inserting into the map under the write lock is the publish step.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: ObjectMap,
    key_algorithm: HashAlgorithm,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_algorithm(key_algorithm: HashAlgorithm) -> Self {
        Self {
            objects: ObjectMap::default(),
            key_algorithm,
        }
    }

    /// Number of objects currently stored
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Copy of the stored bytes, if present
    pub fn object(&self, key: &ObjectKey) -> Option<Bytes> {
        self.objects.read().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn new_object_writer(&self) -> Result<Box<dyn ObjectWriter>, StorageError> {
        Ok(Box::new(MemoryObjectWriter {
            data: BytesMut::new(),
            digests: DigestSet::new(self.key_algorithm),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn get(&self, key: &ObjectKey) -> Result<BlobReader, StorageError> {
        let data = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(Box::pin(Cursor::new(data)))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryObjectWriter {
    data: BytesMut,
    digests: DigestSet,
    objects: ObjectMap,
}

#[async_trait]
impl ObjectWriter for MemoryObjectWriter {
    fn expect_hash(&mut self, algorithm: HashAlgorithm, expected: String) {
        self.digests.expect(algorithm, expected);
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, StorageError> {
        self.data.extend_from_slice(buf);
        self.digests.update(buf);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn save(self: Box<Self>) -> Result<ObjectKey, StorageError> {
        let MemoryObjectWriter {
            data,
            digests,
            objects,
        } = *self;

        let key = digests.finalize()?;
        // Identical content already stored under this key is left untouched
        objects
            .write()
            .entry(key.clone())
            .or_insert_with(|| data.freeze());

        Ok(key)
    }

    async fn remove(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::ContentHasher;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryObjectStore::new();
        let mut writer = store.new_object_writer().await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        assert_eq!(writer.size(), 11);

        let key = writer.save().await.unwrap();
        assert_eq!(
            key.as_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        let mut buffer = Vec::new();
        store
            .get(&key)
            .await
            .unwrap()
            .read_to_end(&mut buffer)
            .await
            .unwrap();
        assert_eq!(buffer, b"hello world");
    }

    #[tokio::test]
    async fn test_unsaved_writer_is_invisible() {
        let store = InMemoryObjectStore::new();
        let mut writer = store.new_object_writer().await.unwrap();
        writer.write(b"pending").await.unwrap();
        assert!(store.is_empty());

        writer.remove().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_hash_mismatch_does_not_insert() {
        let store = InMemoryObjectStore::new();
        let mut writer = store.new_object_writer().await.unwrap();
        writer.expect_hash(HashAlgorithm::Blake3, "00".repeat(32));
        writer.write(b"content").await.unwrap();

        let err = writer.save().await.unwrap_err();
        assert!(matches!(err, StorageError::HashMismatch { algorithm: HashAlgorithm::Blake3, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_matching_expectation_saves() {
        let store = InMemoryObjectStore::new();
        let mut writer = store.new_object_writer().await.unwrap();
        writer.expect_hash(
            HashAlgorithm::Sha512,
            ContentHasher::digest(HashAlgorithm::Sha512, b"content"),
        );
        writer.write(b"content").await.unwrap();

        let key = writer.save().await.unwrap();
        assert_eq!(store.object(&key).unwrap(), Bytes::from_static(b"content"));
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = InMemoryObjectStore::new();
        let key = ObjectKey::from_hex("1".repeat(64)).unwrap();

        assert!(matches!(store.delete(&key).await, Err(StorageError::NotFound(_))));
        assert!(matches!(store.get(&key).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_save_keeps_single_entry() {
        let store = InMemoryObjectStore::new();
        for _ in 0..2 {
            let mut writer = store.new_object_writer().await.unwrap();
            writer.write(b"same").await.unwrap();
            writer.save().await.unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
