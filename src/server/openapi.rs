//! OpenAPI documentation for the vidforge API.

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use super::AppContext;

/// OpenAPI documentation for vidforge.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "vidforge API",
        description = "Upload a video with a list of editing actions and get the edited file back",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "/", description = "Default server")
    ),
    paths(
        super::routes_api::process,
        super::routes_api::download,
        super::routes_api::info,
        super::routes_api::health,
        super::routes_api::get_tools,
    ),
    components(
        schemas(
            super::routes_api::HealthResponse,
            super::routes_api::ToolStatusResponse,
            super::routes_api::ProcessForm,
            super::error::ErrorBody,
            crate::orchestrator::ProcessResponse,
            crate::orchestrator::MediaInfo,
            crate::pipeline::StepReport,
            crate::pipeline::AudioStatus,
        )
    ),
    tags(
        (name = "processing", description = "Video editing, download and inspection"),
        (name = "health", description = "Health check endpoints"),
        (name = "tools", description = "External tools status"),
    )
)]
pub struct ApiDoc;

/// `GET /openapi.json`, nested under `/api`.
pub fn openapi_routes() -> Router<AppContext> {
    Router::new().route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
