use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::docs::openapi_json;
use crate::handlers::{
    diagnostics, health_check, index, new_jot, ready_check, share_link, updates, write_jot,
};
use crate::routes::token_middleware::require_token;
use crate::state::AppState;

/// Create all routes
pub fn create_routes(state: AppState) -> Router {
    // Everything here needs a token that resolves to an existing jot
    let token_routes = Router::new()
        .route("/write", post(write_jot))
        .route("/updates", get(updates))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/", get(index))
        .route("/new", get(new_jot))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/diagnostics", get(diagnostics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/:token", get(share_link))
        .merge(token_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
