use std::sync::Arc;
use thiserror::Error;

use crate::application::dto::ObjectStatDto;
use crate::application::ports::{Inspectable, StorageError};

#[derive(Debug, Error)]
pub enum StatError {
    #[error("Statistics are not available for the {backend} backend")]
    Unsupported { backend: &'static str },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Use case: list per-object statistics.
///
/// Whether the backend can answer is decided once, when the use case is
/// built, by handing it the backend's [`Inspectable`] capability or `None`.
pub struct StatObjectsUseCase {
    inspector: Option<Arc<dyn Inspectable>>,
    backend: &'static str,
}

impl StatObjectsUseCase {
    pub fn new(inspector: Option<Arc<dyn Inspectable>>, backend: &'static str) -> Self {
        Self { inspector, backend }
    }

    pub fn is_supported(&self) -> bool {
        self.inspector.is_some()
    }

    /// Records ordered by upload date, then key
    pub async fn execute(&self) -> Result<Vec<ObjectStatDto>, StatError> {
        let inspector = self.inspector.as_ref().ok_or(StatError::Unsupported {
            backend: self.backend,
        })?;

        let mut records = inspector.stat_all().await?;
        records.sort_by(|a, b| {
            a.upload_date
                .cmp(&b.upload_date)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        Ok(records.into_iter().map(ObjectStatDto::from).collect())
    }
}
