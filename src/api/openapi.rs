//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served at
//! `/openapi.json` and through Swagger UI at `/swagger-ui`.

use utoipa::OpenApi;

/// OpenAPI documentation for the cogfetch REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "cogfetch REST API",
        description = "Register remote rasters, track their download and conversion, and find the tile endpoint once ready",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        // Files
        crate::api::routes::register_file,
        crate::api::routes::list_files,
        crate::api::routes::get_file_status,

        // System
        crate::api::routes::health_check,
        crate::api::routes::version_info,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::ResourceState,
        crate::types::ResourceInfo,
        crate::types::VersionInfo,
        crate::types::Event,

        crate::api::routes::RegisterRequest,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "files", description = "Register remote files and query their progress"),
        (name = "system", description = "Health, version, OpenAPI spec and the event stream"),
    )
)]
pub struct ApiDoc;
