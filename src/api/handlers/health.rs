use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

/// Basic health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
}

/// GET /health
pub async fn health_handler(
    State(backend): State<&'static str>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            backend,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_backend() {
        let (status, Json(body)) = health_handler(State("memory")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.service, "content_vault");
        assert_eq!(body.backend, "memory");
    }
}
