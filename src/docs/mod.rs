use axum::Json;
use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Replace the content of the caller's jot
#[utoipa::path(
    post,
    path = "/write",
    request_body = WriteRequest,
    params(
        ("token" = Option<String>, Query, description = "Jot token; defaults to the token cookie"),
        ("X-Session-Id" = Option<String>, Header, description = "Session of the writing tab, excluded from the live update")
    ),
    responses(
        (status = 204, description = "Content stored"),
        (status = 400, description = "Missing or unknown token, or malformed body", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn write_doc() {}

/// Live update stream (server-sent events)
#[utoipa::path(
    get,
    path = "/updates",
    params(
        ("token" = Option<String>, Query, description = "Jot token; defaults to the token cookie"),
        ("session" = Option<String>, Query, description = "Session id to reuse")
    ),
    responses(
        (status = 200, description = "text/event-stream of connected, content and heartbeat frames"),
        (status = 400, description = "Missing or unknown token", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn updates_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        write_doc,
        updates_doc,
    ),
    components(
        schemas(HealthResponse, WriteRequest, ErrorResponse, DiagnosticsResponse)
    ),
    tags(
        (name = "jotter", description = "Shared jot endpoints")
    )
)]
pub struct ApiDoc;

/// `GET /api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
