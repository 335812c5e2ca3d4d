use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::application::dto::ObjectStatDto;
use crate::application::use_cases::StatObjectsUseCase;

/// GET /stat
/// Per-object statistics; `501` when the backend keeps none
pub async fn stats_handler(
    State(use_case): State<Arc<StatObjectsUseCase>>,
) -> Result<Json<Vec<ObjectStatDto>>, ApiError> {
    Ok(Json(use_case.execute().await?))
}
