//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`files`] - Registration, listing and status of remote files
//! - [`system`] - Health, version, events, OpenAPI

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

mod files;
mod system;

pub use files::*;
pub use system::*;

/// Request body for POST /files
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    /// http(s) URL of the remote raster
    pub url: String,
}

/// Query parameters for GET /files/status
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// URL the file was registered with
    pub url: String,
}
