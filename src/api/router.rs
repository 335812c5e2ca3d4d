use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{
    delete_handler, download_handler, health_handler, stats_handler, upload_handler,
};
use crate::api::middleware::{metrics, rate_limiting};
use crate::application::rate_limiter::RateLimiter;
use crate::application::use_cases::{
    DeleteObjectUseCase, DownloadObjectUseCase, StatObjectsUseCase, UploadObjectUseCase,
};

/// Application state container
pub struct AppState {
    pub upload_use_case: Arc<UploadObjectUseCase>,
    pub download_use_case: Arc<DownloadObjectUseCase>,
    pub delete_use_case: Arc<DeleteObjectUseCase>,
    pub stat_use_case: Arc<StatObjectsUseCase>,
    pub limiter: Arc<RateLimiter>,
    pub backend: &'static str,
}

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Object routes go through admission control; the upload size cap is
    // enforced by the upload use case
    let objects = Router::new()
        .route("/", post(upload_handler).with_state(state.upload_use_case))
        .route("/stat", get(stats_handler).with_state(state.stat_use_case))
        .route(
            "/{key}",
            get(download_handler).with_state(state.download_use_case),
        )
        .route(
            "/{key}",
            delete(delete_handler).with_state(state.delete_use_case),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(axum_middleware::from_fn_with_state(
            state.limiter,
            rate_limiting::rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler).with_state(state.backend))
        .merge(objects)
        .layer(axum_middleware::from_fn(metrics::metrics_middleware))
}
