use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use super::index::token_cookie;
use crate::error::{JotError, JotResult};
use crate::routes::token_middleware::cookie_token;
use crate::services::token_service;
use crate::state::AppState;

/// `GET /new`: mint a jot linked back to the current one and switch the
/// browser over to it
pub async fn new_jot(State(state): State<AppState>, headers: HeaderMap) -> JotResult<Response> {
    let origin = cookie_token(&headers).ok_or_else(|| JotError::invalid_token("No token cookie found"))?;
    if !token_service::is_well_formed(&origin) || !state.store.exists(&origin).await? {
        return Err(JotError::invalid_token("Invalid token"));
    }

    let token = token_service::generate_token();
    state
        .store
        .create_derived(&token, &origin, &state.config.base_url())
        .await?;
    info!("Created new jot derived from {}", origin);

    Ok(([(header::SET_COOKIE, token_cookie(&token))], Redirect::to("/")).into_response())
}
