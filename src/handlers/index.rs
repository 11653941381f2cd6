use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{JotError, JotResult};
use crate::routes::token_middleware::{cookie_token, TOKEN_COOKIE};
use crate::services::token_service;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
pub struct IndexQuery {
    token: Option<String>,
}

const COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Persistent `token` cookie for `token`, kept for a year
pub fn token_cookie(token: &str) -> String {
    cookie::Cookie::build((TOKEN_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(cookie::SameSite::Lax)
        .max_age(cookie::time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .build()
        .to_string()
}

/// Pick the token for a page load.
///
/// An explicit `?token=` must exist. A cookie is used when it still points at
/// a document. With neither, a token is minted only while the store is empty;
/// once any jot exists, visitors need a link.
async fn resolve_token(state: &AppState, query: Option<String>, headers: &HeaderMap) -> JotResult<String> {
    if let Some(token) = query.filter(|t| !t.is_empty()) {
        if !token_service::is_well_formed(&token) {
            return Err(JotError::invalid_token("invalid token format"));
        }
        if state.store.exists(&token).await? {
            return Ok(token);
        }
        return Err(JotError::invalid_token("invalid token"));
    }

    if let Some(token) = cookie_token(headers) {
        if token_service::is_well_formed(&token) && state.store.exists(&token).await? {
            return Ok(token);
        }
        warn!("Ignoring stale token cookie");
    }

    if state.store.has_any_document().await? {
        return Err(JotError::invalid_token("token required"));
    }

    let token = token_service::generate_token();
    info!("No jots yet, minted first token");
    Ok(token)
}

/// `GET /`: render the jot for the resolved token
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
    headers: HeaderMap,
) -> JotResult<Response> {
    let token = resolve_token(&state, query.token, &headers).await?;

    if !state.store.exists(&token).await? {
        state.store.create_default(&token, &state.config.base_url()).await?;
        info!("Created jot for new token");
    }

    let content = state.store.read(&token).await?;
    let page = IndexPage { content: &content }.render()?;

    Ok(([(header::SET_COOKIE, token_cookie(&token))], Html(page)).into_response())
}

/// `GET /:token`: clean share links redirect to the page for that token
pub async fn share_link(State(state): State<AppState>, Path(token): Path<String>) -> JotResult<Response> {
    if token_service::is_well_formed(&token) && state.store.exists(&token).await? {
        return Ok(Redirect::to(&format!("/?token={}", token)).into_response());
    }
    Ok(StatusCode::NOT_FOUND.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_persistent_and_scoped() {
        let cookie = token_cookie("abc");
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=31536000"));
    }

    #[test]
    fn page_escapes_content() {
        let page = IndexPage { content: "<script>alert(1)</script>" }.render().unwrap();
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
