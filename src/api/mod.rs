//! REST API server module
//!
//! A thin HTTP surface over [`CogFetcher`]: registration, status queries, an
//! event stream and the OpenAPI document.

use crate::{CogFetcher, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Files
/// - `POST /files` - Register a remote file (`{"url": ...}`), 202 on success
/// - `GET /files` - List all tracked files
/// - `GET /files/status?url=...` - Status of one file
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /version` - Service and database versions
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(fetcher: Arc<CogFetcher>, config: Arc<Config>) -> Router {
    let state = AppState::new(fetcher, config.clone());

    let router = Router::new()
        // Files
        .route("/files", post(routes::register_file))
        .route("/files", get(routes::list_files))
        .route("/files/status", get(routes::get_file_status))
        // System
        .route("/health", get(routes::health_check))
        .route("/version", get(routes::version_info))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Swagger UI serves its own copy of the document on a separate path
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails. See [`start_api_server_with_shutdown`] for a
/// server that stops on a signal.
///
/// # Example
///
/// ```no_run
/// use cogfetch::{CogFetcher, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let fetcher = Arc::new(CogFetcher::new((*config).clone()).await?);
///
/// cogfetch::api::start_api_server(fetcher, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(fetcher: Arc<CogFetcher>, config: Arc<Config>) -> Result<()> {
    start_api_server_with_shutdown(fetcher, config, std::future::pending()).await
}

/// Start the API server and stop accepting connections once `shutdown` resolves
///
/// In-flight requests are allowed to finish.
pub async fn start_api_server_with_shutdown<F>(
    fetcher: Arc<CogFetcher>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(fetcher, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
