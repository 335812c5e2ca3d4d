use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::value_objects::{ObjectKey, ObjectMetadata};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index backend error: {0}")]
    Backend(String),

    #[error("Corrupt metadata record for {key}: {source}")]
    Corrupt { key: String, source: DomainError },
}

impl From<redis::RedisError> for IndexError {
    fn from(err: redis::RedisError) -> Self {
        IndexError::Backend(err.to_string())
    }
}

/// Port for the external key-value index that tracks object statistics.
///
/// Implementations must make each method atomic per key; in particular
/// `increment_downloads` is a single read-modify-write on the index side.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Store a fresh record and mark the key as known, unless it already is.
    ///
    /// The check and the write are one atomic step, so a live record (and
    /// its download count) is never replaced. Returns whether a record was
    /// written.
    async fn record_upload(&self, metadata: &ObjectMetadata) -> Result<bool, IndexError>;

    /// Whether the key is currently live
    async fn is_known(&self, key: &ObjectKey) -> Result<bool, IndexError>;

    /// Bump the download counter, returning the new value
    async fn increment_downloads(&self, key: &ObjectKey) -> Result<u64, IndexError>;

    /// Forget the key as live and stamp `remove_date` on its record
    async fn mark_removed(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), IndexError>;

    /// Every record ever registered, live or removed
    async fn list_all(&self) -> Result<Vec<ObjectMetadata>, IndexError>;

    /// Connectivity check used at startup
    async fn ping(&self) -> Result<(), IndexError>;
}
