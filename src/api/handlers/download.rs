use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::errors::ApiError;
use crate::application::use_cases::DownloadObjectUseCase;

/// GET /{key}
/// Download object by content key with streaming response
pub async fn download_handler(
    State(use_case): State<Arc<DownloadObjectUseCase>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let object = use_case.execute(&key).await?;

    let body = Body::from_stream(ReaderStream::new(object.reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header("X-Content-Hash", object.key.as_hex())
        .body(body)
        .map_err(|e| ApiError::internal_error(format!("Failed to build response: {}", e)))
}
