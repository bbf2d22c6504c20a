//! Rate-limit check and stats handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::error::AppError;
use crate::types::Decision;

use super::{parse_user_id, AppState};

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct AllowedBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    status: &'static str,
}

/// Body of a 429 response. `RetryAfter` is rendered as a string, mirroring
/// the `Retry-After` header.
#[derive(Debug, Serialize)]
pub struct RateLimitedBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    status: &'static str,
    #[serde(rename = "RetryAfter")]
    retry_after: String,
}

/// GET /api/check?userId=<uuid>
pub async fn check(
    State(state): State<AppState>,
    params: Result<Query<UserIdQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let user_id = parse_user_id(&params.user_id)?;

    let user = queries::user::get_user(&state.pool, user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;

    match state.limiter.check(&user).await? {
        Decision::Allowed => Ok((
            StatusCode::OK,
            Json(AllowedBody {
                status_code: 200,
                status: "ALLOWED",
            }),
        )
            .into_response()),
        Decision::RateLimited {
            retry_after_seconds,
        } => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_seconds.to_string())],
            Json(RateLimitedBody {
                status_code: 429,
                status: "NOT ALLOWED",
                retry_after: retry_after_seconds.to_string(),
            }),
        )
            .into_response()),
    }
}

/// GET /rate-limit-stats?userId=<uuid>
pub async fn stats(
    State(state): State<AppState>,
    params: Result<Query<UserIdQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let user_id = parse_user_id(&params.user_id)?;

    let user = queries::user::get_user(&state.pool, user_id)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;

    let stats = state.limiter.stats(&user).await?;
    Ok(Json(stats).into_response())
}
