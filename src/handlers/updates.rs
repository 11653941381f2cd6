use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::info;

use crate::error::JotError;
use crate::live::live_stream;
use crate::routes::token_middleware::{requested_session, DocToken};
use crate::services::token_service;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdatesQuery {
    session: Option<String>,
}

/// `GET /updates`: open the live update stream for the caller's token.
///
/// The response never ends on its own; it closes when the client goes away or
/// the server shuts down, and the session is unsubscribed either way.
pub async fn updates(
    State(state): State<AppState>,
    Extension(DocToken(token)): Extension<DocToken>,
    Query(query): Query<UpdatesQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session = requested_session(&headers, query.session.as_deref())
        .unwrap_or_else(token_service::generate_session_id);
    info!("Opening live stream for token {} session {}", token, session);

    let sub = state.registry.subscribe(&token, &session);
    let frames = live_stream(
        sub,
        state.store.clone(),
        state.config.heartbeat_interval(),
        state.shutdown.clone(),
    );
    let events = frames.map(|frame| {
        Event::default()
            .json_data(&frame)
            .map_err(|e| JotError::Connection(format!("failed to encode {:?} frame: {}", frame.kind(), e)))
    });

    (
        [(HeaderName::from_static("x-accel-buffering"), HeaderValue::from_static("no"))],
        Sse::new(events),
    )
}
