//! HTTP error response handling for the API
//!
//! Converts domain errors into HTTP responses with a status code and a JSON
//! error body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, status = status_code.as_u16(), "Request failed");
        }

        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

/// Explicit `ApiError` responses are request validation failures
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use crate::types::ResourceState;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_into_response() {
        let response = Error::NotFound("resource https://a/b.tif".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "not_found");
        assert!(api_error.error.message.contains("https://a/b.tif"));
    }

    #[tokio::test]
    async fn test_conflict_into_response_carries_state() {
        let response = Error::RegistrationConflict {
            url: "https://a/b.tif".to_string(),
            state: ResourceState::Processing,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "registration_conflict");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["state"], "processing");
    }

    #[tokio::test]
    async fn test_metadata_unavailable_is_503() {
        let response = Error::MetadataUnavailable {
            url: "https://a/b.tif".to_string(),
            reason: "no Content-Length header".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_of(response).await.error.code, "metadata_unavailable");
    }

    #[tokio::test]
    async fn test_transfer_status_is_bad_gateway() {
        let response = Error::Transfer(TransferError::Status {
            url: "https://a/b.tif".to_string(),
            status: 404,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_api_error_into_response_is_bad_request() {
        let response = ApiError::validation("url must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.error.code, "validation_error");
    }
}
