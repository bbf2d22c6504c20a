//! HTTP handlers and routing.

pub mod ping;
pub mod rate_limit;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::rate_limiter::RateLimiter;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub limiter: Arc<RateLimiter>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(ping::health))
        .route("/api/check", get(rate_limit::check))
        .route("/rate-limit-stats", get(rate_limit::stats))
        .route("/users/{user_id}/rate-limits", put(users::update_rate_limits))
        .with_state(state)
}

/// Parse a userId supplied at the edge. Invalid input never reaches a store.
pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid userId: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_user_id_parses() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn malformed_user_id_is_bad_request() {
        let err = parse_user_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Invalid userId: not-a-uuid"));
    }
}
