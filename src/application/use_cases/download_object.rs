use std::sync::Arc;
use thiserror::Error;

use crate::application::ports::{BlobReader, ObjectStore, StorageError};
use crate::domain::value_objects::ObjectKey;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Object not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for DownloadError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => DownloadError::NotFound(key),
            other => DownloadError::Storage(other),
        }
    }
}

/// Stream of a stored object together with its key
pub struct DownloadedObject {
    pub key: ObjectKey,
    pub reader: BlobReader,
}

/// Use case: Download an object by content key
pub struct DownloadObjectUseCase {
    store: Arc<dyn ObjectStore>,
}

impl DownloadObjectUseCase {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// A malformed key cannot name a stored object and reports `NotFound`
    pub async fn execute(&self, key: &str) -> Result<DownloadedObject, DownloadError> {
        let key = ObjectKey::from_hex(key).map_err(|_| DownloadError::NotFound(key.to_string()))?;
        let reader = self.store.get(&key).await?;
        Ok(DownloadedObject { key, reader })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockObjectStore;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_download_streams_content() {
        let mut mock_store = MockObjectStore::new();
        mock_store
            .expect_get()
            .times(1)
            .returning(|_| Ok(Box::pin(Cursor::new(b"content".to_vec()))));

        let use_case = DownloadObjectUseCase::new(Arc::new(mock_store));
        let mut object = use_case.execute(&"AB".repeat(32)).await.unwrap();

        assert_eq!(object.key.as_hex(), "ab".repeat(32));
        let mut buffer = Vec::new();
        object.reader.read_to_end(&mut buffer).await.unwrap();
        assert_eq!(buffer, b"content");
    }

    #[tokio::test]
    async fn test_download_invalid_key_is_not_found() {
        let mut mock_store = MockObjectStore::new();
        mock_store.expect_get().times(0);

        let use_case = DownloadObjectUseCase::new(Arc::new(mock_store));
        let not_hex = "z".repeat(64);
        for key in ["../etc/passwd", "abc", not_hex.as_str()] {
            assert!(matches!(
                use_case.execute(key).await,
                Err(DownloadError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_download_missing_object_is_not_found() {
        let mut mock_store = MockObjectStore::new();
        mock_store
            .expect_get()
            .times(1)
            .returning(|k| Err(StorageError::NotFound(k.to_string())));

        let use_case = DownloadObjectUseCase::new(Arc::new(mock_store));
        assert!(matches!(
            use_case.execute(&"1".repeat(64)).await,
            Err(DownloadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_io_failure_is_storage_error() {
        let mut mock_store = MockObjectStore::new();
        mock_store.expect_get().times(1).returning(|_| {
            Err(StorageError::Io {
                op: "open",
                source: std::io::Error::other("device error"),
            })
        });

        let use_case = DownloadObjectUseCase::new(Arc::new(mock_store));
        assert!(matches!(
            use_case.execute(&"1".repeat(64)).await,
            Err(DownloadError::Storage(StorageError::Io { .. }))
        ));
    }
}
