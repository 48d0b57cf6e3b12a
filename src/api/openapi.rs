//! OpenAPI documentation and schema generation
//!
//! Spec generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the ppconv REST API
///
/// Served at:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ppconv REST API",
        version = "0.1.0",
        description = "Upload bitmaps or .pp images, convert them with the external codec, and download each result once",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Conversions
        crate::api::routes::process_upload,
        crate::api::routes::download_artifact,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(
        schemas(
            crate::api::routes::ProcessResponse,
            crate::api::routes::ProcessStats,
            crate::types::ConversionMode,
            crate::types::ConversionResult,
            crate::types::JobId,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "conversions", description = "Upload-and-convert and one-shot downloads"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
