//! User types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user of the rate-limited API.
///
/// The persisted row keeps the override as three nullable columns; they are
/// folded into `rate_override` when the row is read, so nothing downstream
/// ever sees a partially populated override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tier: String,
    pub rate_override: Option<Override>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A per-user limit override, superseding the tier until it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub limit: i64,
    pub window_seconds: i64,
    pub expires_at: DateTime<Utc>,
}

impl Override {
    /// Fold the persisted column trio into a single optional override.
    /// A partial trio (any column NULL) means no override.
    pub fn from_columns(
        limit: Option<i64>,
        window_seconds: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (limit, window_seconds, expires_at) {
            (Some(limit), Some(window_seconds), Some(expires_at)) => Some(Self {
                limit,
                window_seconds,
                expires_at,
            }),
            _ => None,
        }
    }

    /// An override counts only until its expiry instant, exclusive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
