use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::application::ports::StorageError;
use crate::application::rate_limiter::RateLimitError;
use crate::application::use_cases::{DeleteError, DownloadError, StatError, UploadError};

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            retry_after,
            ..Self::new(StatusCode::TOO_MANY_REQUESTS, message)
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: &self.message,
            retry_after: self.retry_after,
        });

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// Convert use case errors to API errors

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ApiError::not_found(format!("Object not found: {}", key)),
            e @ StorageError::HashMismatch { .. } => ApiError::bad_request(e.to_string()),
            StorageError::Unsupported(op) => {
                ApiError::not_implemented(format!("Not supported by this backend: {}", op))
            }
            e => {
                error!(error = %e, "storage failure");
                ApiError::internal_error(format!("Storage error: {}", e))
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Storage(e) => e.into(),
            e @ UploadError::TooLarge { .. } => ApiError::payload_too_large(e.to_string()),
            e @ UploadError::Body(_) => ApiError::bad_request(e.to_string()),
            UploadError::Cancelled => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Upload cancelled by shutdown")
            }
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::NotFound(key) => ApiError::not_found(format!("Object not found: {}", key)),
            DownloadError::Storage(e) => e.into(),
        }
    }
}

impl From<DeleteError> for ApiError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::NotFound(key) => ApiError::not_found(format!("Object not found: {}", key)),
            DeleteError::Storage(e) => e.into(),
        }
    }
}

impl From<StatError> for ApiError {
    fn from(err: StatError) -> Self {
        match err {
            e @ StatError::Unsupported { .. } => ApiError::not_implemented(e.to_string()),
            StatError::Storage(e) => e.into(),
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        let retry_after = err.retry_after_secs();
        ApiError::too_many_requests("Rate limit exceeded", retry_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::HashAlgorithm;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                DownloadError::NotFound("k".to_string()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                UploadError::Storage(StorageError::HashMismatch {
                    algorithm: HashAlgorithm::Sha256,
                    expected: "a".to_string(),
                    actual: "b".to_string(),
                })
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (UploadError::TooLarge { max: 1 }.into(), StatusCode::PAYLOAD_TOO_LARGE),
            (
                StatError::Unsupported { backend: "memory" }.into(),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                DeleteError::Storage(StorageError::Internal("boom".to_string())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status(), status);
        }
    }

    #[test]
    fn test_hash_mismatch_message() {
        let error: ApiError = StorageError::HashMismatch {
            algorithm: HashAlgorithm::Sha512,
            expected: "a".to_string(),
            actual: "b".to_string(),
        }
        .into();

        assert!(error.message.contains("hash mismatch"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after_header() {
        let error: ApiError = RateLimitError::TooManyRequests {
            remote: "10.0.0.1".to_string(),
            retry_after: Duration::from_millis(300),
        }
        .into();

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn test_byte_quota_has_no_retry_after() {
        let error: ApiError = RateLimitError::ByteQuotaExhausted {
            remote: "10.0.0.1".to_string(),
        }
        .into();

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
