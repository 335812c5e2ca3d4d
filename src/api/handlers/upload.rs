use axum::{
    body::Body,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use futures_util::TryStreamExt;
use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::application::dto::{UploadRequest, UploadResponse};
use crate::application::use_cases::UploadObjectUseCase;

/// POST /
/// Upload object with streaming body.
///
/// Query parameters named after a hash algorithm (`?sha256=...`) are
/// expected digests of the payload; any other parameter is ignored.
pub async fn upload_handler(
    State(use_case): State<Arc<UploadObjectUseCase>>,
    Query(params): Query<Vec<(String, String)>>,
    body: Body,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let request = UploadRequest {
        expected_hashes: params,
    };

    // Convert body to async reader
    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let reader = Box::pin(tokio_util::io::StreamReader::new(stream));

    let response = use_case.execute(request, reader).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
