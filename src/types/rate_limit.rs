//! Rate limit decision and stats types

use serde::Serialize;
use uuid::Uuid;

/// Outcome of a rate-limit check.
///
/// `RateLimited` is a successful decision with a non-200 HTTP mapping,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    RateLimited { retry_after_seconds: i64 },
}

/// Read-only snapshot of a user's current bucket.
///
/// `seconds_until_reset` forwards the counter store's raw TTL reply,
/// including the sentinels `-1` (key without expiry) and `-2` (no key).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub id: Uuid,
    pub tier: String,
    pub limit: i64,
    pub window_seconds: i64,
    pub current_count: i64,
    pub seconds_until_reset: i64,
    pub override_active: bool,
}
