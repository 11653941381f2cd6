use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Errors surfaced by the jot service
#[derive(Debug, Error)]
pub enum JotError {
    /// Malformed token, or no document exists for it
    #[error("{0}")]
    InvalidToken(String),

    /// Request could not be understood
    #[error("{0}")]
    BadRequest(String),

    /// Storage failure
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A live stream could not deliver a frame to its connection
    #[error("connection error: {0}")]
    Connection(String),

    /// The directory watcher failed
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

impl JotError {
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            JotError::InvalidToken(_) | JotError::BadRequest(_) => StatusCode::BAD_REQUEST,
            JotError::Io(_)
            | JotError::Connection(_)
            | JotError::Watch(_)
            | JotError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for JotError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        // Storage details stay in the log
        let message = match &self {
            JotError::Io(_) => "Failed to access jot storage".to_string(),
            JotError::Template(_) => "Failed to render page".to_string(),
            other => other.to_string(),
        };
        (
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: message,
            }),
        )
            .into_response()
    }
}

pub type JotResult<T> = Result<T, JotError>;
