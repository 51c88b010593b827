//! Error types for cogfetch
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (registration, transfer, transform, database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::ResourceState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for cogfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cogfetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size_bytes")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-error record (or an in-flight job) already exists for the URL or
    /// for its artifact path
    #[error("{url} is already tracked (state: {state})")]
    RegistrationConflict {
        /// The URL whose record or job holds the registration
        url: String,
        /// State of the existing record
        state: ResourceState,
    },

    /// The remote size could not be obtained, so no job was created
    #[error("metadata unavailable for {url}: {reason}")]
    MetadataUnavailable {
        /// The URL that was probed
        url: String,
        /// Why the probe failed
        reason: String,
    },

    /// The URL cannot be mapped onto a local artifact path
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Transfer stage failure
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Transform stage failure
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    /// Internal consistency violation (e.g. record vanished mid-job)
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Shutdown in progress - not admitting new jobs
    #[error("shutdown in progress: not accepting new files")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Transfer stage errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source answered with a non-success status
    #[error("{url} answered with HTTP {status}")]
    Status {
        /// Source URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The overall transfer deadline elapsed
    #[error("timed out fetching {url}")]
    Timeout {
        /// Source URL
        url: String,
    },

    /// Connection or body read failure
    #[error("transfer of {url} interrupted: {reason}")]
    Interrupted {
        /// Source URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The body ended before the declared size was reached
    #[error("{url} ended after {received} of {expected} bytes")]
    Incomplete {
        /// Source URL
        url: String,
        /// Declared size
        expected: u64,
        /// Bytes actually received
        received: u64,
    },
}

impl TransferError {
    /// Classify a reqwest error raised while fetching `url`
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransferError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            TransferError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            TransferError::Interrupted {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

/// Transform stage errors
#[derive(Debug, Error)]
pub enum TransformError {
    /// The conversion routine reported failure
    #[error("{reason}")]
    Failed {
        /// The reason the conversion failed
        reason: String,
    },

    /// The conversion routine panicked on its worker thread
    #[error("conversion task panicked: {reason}")]
    Panicked {
        /// Panic description
        reason: String,
    },

    /// No conversion program is available
    #[error("no conversion program available: {0}")]
    Unavailable(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "registration_conflict",
///     "message": "https://example.com/a.tif is already tracked (state: downloading)",
///     "details": { "url": "https://example.com/a.tif", "state": "downloading" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "registration_conflict")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,

            Error::NotFound(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,

            Error::RegistrationConflict { .. } => 409,

            Error::Transform(_) => 422,

            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Consistency(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::Transfer(_) => 502,

            Error::MetadataUnavailable { .. } => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::RegistrationConflict { .. } => "registration_conflict",
            Error::MetadataUnavailable { .. } => "metadata_unavailable",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Transfer(e) => match e {
                TransferError::Status { .. } => "transfer_status",
                TransferError::Timeout { .. } => "transfer_timeout",
                TransferError::Interrupted { .. } => "transfer_interrupted",
                TransferError::Incomplete { .. } => "transfer_incomplete",
            },
            Error::Transform(e) => match e {
                TransformError::Failed { .. } => "transform_failed",
                TransformError::Panicked { .. } => "transform_panicked",
                TransformError::Unavailable(_) => "transform_unavailable",
            },
            Error::Consistency(_) => "consistency_error",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::RegistrationConflict { url, state } => Some(serde_json::json!({
                "url": url,
                "state": state,
            })),
            Error::MetadataUnavailable { url, reason } => Some(serde_json::json!({
                "url": url,
                "reason": reason,
            })),
            Error::Transfer(TransferError::Status { url, status }) => Some(serde_json::json!({
                "url": url,
                "upstream_status": status,
            })),
            Error::Transfer(TransferError::Incomplete {
                url,
                expected,
                received,
            }) => Some(serde_json::json!({
                "url": url,
                "expected_bytes": expected,
                "received_bytes": received,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
