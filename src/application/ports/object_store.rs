use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::application::ports::IndexError;
use crate::domain::value_objects::{HashAlgorithm, ObjectKey, ObjectMetadata};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error during {op}: {source}")]
    Io {
        op: &'static str,
        source: std::io::Error,
    },

    #[error("{algorithm} hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch {
        algorithm: HashAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Metadata index error: {0}")]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Wrap an I/O error with the name of the operation that produced it
    pub fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| StorageError::Io { op, source }
    }

    /// Like [`StorageError::io`], but maps `ErrorKind::NotFound` to `NotFound(key)`
    pub fn io_or_not_found<'a>(
        op: &'static str,
        key: &'a ObjectKey,
    ) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io { op, source }
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Type alias for async reader
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Write-once streaming sink for a single upload.
///
/// Bytes go to the backend's destination and to every hash accumulator in
/// the same call. Nothing is visible to readers until `save` returns `Ok`.
/// Exactly one of `save` or `remove` ends the session; a writer dropped
/// without either must release its scratch resources.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Register an expected digest, checked before commit.
    ///
    /// May be called before or between writes.
    fn expect_hash(&mut self, algorithm: HashAlgorithm, expected: String);

    /// Append bytes and return how many were accepted
    async fn write(&mut self, buf: &[u8]) -> Result<usize, StorageError>;

    /// Bytes written so far
    fn size(&self) -> u64;

    /// Verify expectations, publish under the content key and return it.
    ///
    /// On `HashMismatch` the written data has already been discarded.
    async fn save(self: Box<Self>) -> Result<ObjectKey, StorageError>;

    /// Discard everything written without publishing a key
    async fn remove(self: Box<Self>) -> Result<(), StorageError>;
}

/// Port for content-addressed object storage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Start a new upload session
    async fn new_object_writer(&self) -> Result<Box<dyn ObjectWriter>, StorageError>;

    /// Open a committed object for reading
    async fn get(&self, key: &ObjectKey) -> Result<BlobReader, StorageError>;

    /// Remove a committed object
    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Capability exposed by backends that keep per-object statistics
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Inspectable: Send + Sync {
    /// Every object the index has seen, including removed ones
    async fn stat_all(&self) -> Result<Vec<ObjectMetadata>, StorageError>;
}
