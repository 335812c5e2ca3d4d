use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dto::{UploadRequest, UploadResponse};
use crate::application::ports::{BlobReader, ObjectStore, ObjectWriter, StorageError};
use crate::domain::value_objects::HashAlgorithm;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Upload exceeds the maximum size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Failed to read request body: {0}")]
    Body(std::io::Error),
}

/// Use case: stream a payload into the store and return its content key
pub struct UploadObjectUseCase {
    store: Arc<dyn ObjectStore>,
    max_file_size: u64,
    shutdown: CancellationToken,
}

impl UploadObjectUseCase {
    pub fn new(store: Arc<dyn ObjectStore>, max_file_size: u64) -> Self {
        Self::with_shutdown(store, max_file_size, CancellationToken::new())
    }

    /// Uploads still running when `shutdown` is cancelled are abandoned
    pub fn with_shutdown(
        store: Arc<dyn ObjectStore>,
        max_file_size: u64,
        shutdown: CancellationToken,
    ) -> Self {
        let max_file_size = if max_file_size == 0 {
            DEFAULT_MAX_FILE_SIZE_BYTES
        } else {
            max_file_size
        };

        Self {
            store,
            max_file_size,
            shutdown,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Execute upload workflow
    pub async fn execute(
        &self,
        request: UploadRequest,
        reader: BlobReader,
    ) -> Result<UploadResponse, UploadError> {
        self.execute_with_cancel(request, reader, self.shutdown.child_token())
            .await
    }

    /// Execute upload workflow, abandoning the write when `cancel` fires
    pub async fn execute_with_cancel(
        &self,
        request: UploadRequest,
        mut reader: BlobReader,
        cancel: CancellationToken,
    ) -> Result<UploadResponse, UploadError> {
        let mut writer = self.store.new_object_writer().await?;

        for (name, expected) in request.expected_hashes {
            match name.parse::<HashAlgorithm>() {
                Ok(algorithm) => writer.expect_hash(algorithm, expected),
                Err(_) => debug!(algorithm = %name, "ignoring unsupported hash algorithm"),
            }
        }

        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abandon(writer, "cancelled").await;
                    return Err(UploadError::Cancelled);
                }
                read = reader.read(&mut buffer) => read,
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    abandon(writer, "body read failed").await;
                    return Err(UploadError::Body(e));
                }
            };

            if writer.size() + n as u64 > self.max_file_size {
                abandon(writer, "size limit exceeded").await;
                return Err(UploadError::TooLarge {
                    max: self.max_file_size,
                });
            }

            if let Err(e) = writer.write(&buffer[..n]).await {
                abandon(writer, "write failed").await;
                return Err(e.into());
            }
        }

        let size = writer.size();
        let key = match writer.save().await {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, size, "upload rejected");
                return Err(e.into());
            }
        };

        info!(key = %key, size, backend = self.store.backend_name(), "object stored");
        Ok(UploadResponse::from(key))
    }
}

async fn abandon(writer: Box<dyn ObjectWriter>, reason: &'static str) {
    let size = writer.size();
    if let Err(e) = writer.remove().await {
        warn!(reason, error = %e, "failed to discard abandoned upload");
    } else {
        debug!(reason, size, "upload abandoned");
    }
}
