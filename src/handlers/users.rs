//! Rate-limit override administration handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::clock::Clock;
use crate::db::queries;
use crate::db::queries::user::OverridePatch;
use crate::error::AppError;

use super::{parse_user_id, AppState};

/// Partial override update. Omitted (or null) fields keep their stored
/// value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UpdateRateLimitsRequest {
    #[serde(rename = "overrideLimit")]
    pub override_limit: Option<i64>,
    #[serde(rename = "overrideWindowSeconds")]
    pub override_window_seconds: Option<i64>,
    #[serde(rename = "overrideExpiry")]
    pub override_expiry: Option<DateTime<Utc>>,
}

impl UpdateRateLimitsRequest {
    /// Reject nonsensical values before anything is written. Cross-field
    /// validation is deliberately absent: a patch may leave the override
    /// inactive, which simply means no override applies.
    fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if let Some(limit) = self.override_limit {
            if limit <= 0 {
                return Err("overrideLimit must be positive".to_string());
            }
        }
        if let Some(window) = self.override_window_seconds {
            if window <= 0 {
                return Err("overrideWindowSeconds must be positive".to_string());
            }
        }
        if let Some(expiry) = self.override_expiry {
            if expiry <= now {
                return Err("overrideExpiry must be in the future".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct UpdatedOverride {
    #[serde(rename = "overrideLimit")]
    override_limit: Option<i64>,
    #[serde(rename = "overrideWindowSeconds")]
    override_window_seconds: Option<i64>,
    #[serde(rename = "overrideExpiry")]
    override_expiry: Option<DateTime<Utc>>,
}

/// PUT /users/{userId}/rate-limits
pub async fn update_rate_limits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<UpdateRateLimitsRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    request
        .validate(state.limiter.clock.now())
        .map_err(AppError::BadRequest)?;

    let patch = OverridePatch {
        limit: request.override_limit,
        window_seconds: request.override_window_seconds,
        expires_at: request.override_expiry,
    };

    let updated = queries::user::update_rate_limit_override(&state.pool, user_id, patch)
        .await?
        .ok_or(AppError::UserNotFound(user_id))?;

    info!(%user_id, "rate limit override updated");

    Ok(Json(json!({
        "success": true,
        "userId": user_id,
        "updated": UpdatedOverride {
            override_limit: updated.override_limit,
            override_window_seconds: updated.override_window_seconds,
            override_expiry: updated.override_expiry,
        },
    })))
}
