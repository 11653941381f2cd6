use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::debug;

use crate::error::{JotError, JotResult};
use crate::models::WriteRequest;
use crate::routes::token_middleware::{requested_session, DocToken};
use crate::state::AppState;

/// `POST /write`: replace the jot's content.
///
/// Fan-out is not done here; the change observer picks the write up from the
/// change queue (or from the directory watch) and delivers it.
pub async fn write_jot(
    State(state): State<AppState>,
    Extension(DocToken(token)): Extension<DocToken>,
    headers: HeaderMap,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> JotResult<StatusCode> {
    let Json(request) = body.map_err(|e| JotError::bad_request(format!("Invalid body: {}", e.body_text())))?;
    let session = requested_session(&headers, None);

    state.changes.record_write(&token, session.as_deref(), &request.content);
    state.store.write(&token, &request.content).await?;
    debug!("Jot {} written by session {:?}", token, session);

    state.changes.notify_written(&token, session).await;
    Ok(StatusCode::NO_CONTENT)
}
