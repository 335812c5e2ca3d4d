use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::application::use_cases::DeleteObjectUseCase;

/// DELETE /{key}
pub async fn delete_handler(
    State(use_case): State<Arc<DeleteObjectUseCase>>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    use_case.execute(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
