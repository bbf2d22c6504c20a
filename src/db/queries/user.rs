//! User store queries.
//!
//! The override column trio is folded into `Option<Override>` here, at the
//! store boundary; callers never see a partially populated override.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::types::{Override, User};

/// Raw users row as persisted.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    tier: String,
    override_limit: Option<i64>,
    override_window_seconds: Option<i64>,
    override_expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            tier: row.tier,
            rate_override: Override::from_columns(
                row.override_limit,
                row.override_window_seconds,
                row.override_expiry,
            ),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Get user by ID
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT
            id, tier,
            override_limit, override_window_seconds, override_expiry,
            created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

/// Fields supplied in an override patch. `None` means "leave unchanged".
#[derive(Debug, Clone, Copy, Default)]
pub struct OverridePatch {
    pub limit: Option<i64>,
    pub window_seconds: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Override columns as returned after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct OverrideColumns {
    pub override_limit: Option<i64>,
    pub override_window_seconds: Option<i64>,
    pub override_expiry: Option<DateTime<Utc>>,
}

/// Patch the override trio in a single statement, bumping `updated_at`.
/// Returns the post-update trio, or `None` if no row matched.
pub async fn update_rate_limit_override(
    pool: &PgPool,
    user_id: Uuid,
    patch: OverridePatch,
) -> Result<Option<OverrideColumns>, sqlx::Error> {
    sqlx::query_as::<_, OverrideColumns>(
        r#"
        UPDATE users SET
            override_limit = COALESCE($2, override_limit),
            override_window_seconds = COALESCE($3, override_window_seconds),
            override_expiry = COALESCE($4, override_expiry),
            updated_at = NOW()
        WHERE id = $1
        RETURNING override_limit, override_window_seconds, override_expiry
        "#,
    )
    .bind(user_id)
    .bind(patch.limit)
    .bind(patch.window_seconds)
    .bind(patch.expires_at)
    .fetch_optional(pool)
    .await
}
