use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::application::ports::{ObjectStore, StorageError};
use crate::domain::value_objects::ObjectKey;

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Object not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for DeleteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => DeleteError::NotFound(key),
            other => DeleteError::Storage(other),
        }
    }
}

/// Use case: Delete an object by content key
pub struct DeleteObjectUseCase {
    store: Arc<dyn ObjectStore>,
}

impl DeleteObjectUseCase {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Execute delete workflow
    pub async fn execute(&self, key: &str) -> Result<(), DeleteError> {
        let key = ObjectKey::from_hex(key).map_err(|_| DeleteError::NotFound(key.to_string()))?;
        self.store.delete(&key).await?;
        info!(key = %key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ObjectWriter;
    use crate::infrastructure::storage::InMemoryObjectStore;

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let store = Arc::new(InMemoryObjectStore::new());
        let mut writer = store.new_object_writer().await.unwrap();
        writer.write(b"hello world").await.unwrap();
        let key = writer.save().await.unwrap();

        let use_case = DeleteObjectUseCase::new(store.clone());
        use_case.execute(key.as_hex()).await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            use_case.execute(key.as_hex()).await,
            Err(DeleteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_invalid_key_is_not_found() {
        let use_case = DeleteObjectUseCase::new(Arc::new(InMemoryObjectStore::new()));
        assert!(matches!(
            use_case.execute("not-a-key").await,
            Err(DeleteError::NotFound(_))
        ));
    }
}
