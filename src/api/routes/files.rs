//! File registration and status handlers.

use super::{RegisterRequest, StatusQuery};
use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /files - Register a remote file for fetching and conversion
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "Registered; the job runs in the background", body = crate::types::ResourceInfo),
        (status = 400, description = "Invalid URL", body = crate::error::ApiError),
        (status = 409, description = "Already registered and not failed", body = crate::error::ApiError),
        (status = 503, description = "Remote size unavailable or shutting down", body = crate::error::ApiError)
    )
)]
pub async fn register_file(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if request.url.trim().is_empty() {
        return ApiError::validation("url must not be empty").into_response();
    }

    match state.fetcher.register(&request.url).await {
        Ok(info) => (StatusCode::ACCEPTED, Json(info)).into_response(),
        Err(e) => {
            tracing::debug!(url = %request.url, error = %e, "Registration rejected");
            e.into_response()
        }
    }
}

/// GET /files - List all tracked files
#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    responses(
        (status = 200, description = "All tracked files, oldest first", body = Vec<crate::types::ResourceInfo>),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn list_files(State(state): State<AppState>) -> Response {
    match state.fetcher.list().await {
        Ok(files) => (StatusCode::OK, Json(files)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /files/status - Status of one tracked file
#[utoipa::path(
    get,
    path = "/files/status",
    tag = "files",
    params(StatusQuery),
    responses(
        (status = 200, description = "Current status", body = crate::types::ResourceInfo),
        (status = 404, description = "URL was never registered", body = crate::error::ApiError)
    )
)]
pub async fn get_file_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    match state.fetcher.status(&query.url).await {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => e.into_response(),
    }
}
