//! Application error taxonomy and HTTP mappings.
//!
//! Every failure kind has exactly one external mapping. Response bodies
//! carry only the classified message; the underlying cause is logged with
//! its context before the response is built. A rate-limited request is a
//! `Decision`, not an error, and never passes through here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum AppError {
    /// No user row for the requested id.
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    /// Invalid input at the HTTP edge: bad UUID, malformed body, failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// User store transport or schema failure.
    #[error("user store failure: {0}")]
    UserStore(#[from] sqlx::Error),

    /// Counter store transport, connect, or reply-shape failure.
    #[error("counter store failure: {0}")]
    Store(#[from] CacheError),

    /// Missing tier policy or invalid window configuration.
    #[error("{0}")]
    Config(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::UserStore(e) => {
                tracing::error!("User store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Counter store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }
            AppError::Config(msg) => {
                tracing::error!("Config error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Config error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
