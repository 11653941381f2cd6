use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::JotError;
use crate::services::token_service;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";
pub const SESSION_HEADER: &str = "x-session-id";

/// A token that is well formed and has a document behind it
#[derive(Clone, Debug)]
pub struct DocToken(pub String);

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// `token` query parameter, if present and non-empty
pub fn query_token(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

/// `token` cookie, if present
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(cookie::Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == TOKEN_COOKIE)
        .map(|c| c.value().to_string())
}

/// Session id sent by the client, from the `X-Session-Id` header or a
/// fallback value (EventSource cannot set headers). Ill-formed ids are ignored.
pub fn requested_session(headers: &HeaderMap, fallback: Option<&str>) -> Option<String> {
    let candidate = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(fallback)?;
    if token_service::is_valid_session_id(candidate) {
        Some(candidate.to_string())
    } else {
        warn!("Ignoring malformed session id");
        None
    }
}

/// Resolve the request's token from query or cookie and make sure a document
/// exists for it. Handlers behind this middleware read it as
/// `Extension<DocToken>`.
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, JotError> {
    let token = query_token(req.uri())
        .or_else(|| cookie_token(req.headers()))
        .ok_or_else(|| JotError::invalid_token("No token provided"))?;

    if !token_service::is_well_formed(&token) {
        return Err(JotError::invalid_token(format!("Invalid token format: {}", token)));
    }
    if !state.store.exists(&token).await? {
        debug!("Rejected unknown token {}", token);
        return Err(JotError::invalid_token(format!("Invalid token: {}", token)));
    }

    req.extensions_mut().insert(DocToken(token));
    Ok(next.run(req).await)
}
