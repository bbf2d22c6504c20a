//! Read-only projection of a user's current bucket.

use tracing::debug;

use crate::error::AppError;
use crate::services::rate_limiter::{bucket_start, counter_key, RateLimiter};
use crate::types::{RateLimitStats, User};

impl RateLimiter {
    /// Snapshot the user's current bucket without mutating it.
    ///
    /// `seconds_until_reset` carries the raw TTL reply, sentinels included:
    /// `-1` for a key without expiry, `-2` when no key exists. Interpreting
    /// the sentinels is left to the caller.
    pub async fn stats(&self, user: &User) -> Result<RateLimitStats, AppError> {
        let now = self.clock.now();
        let limits = self.policies.resolve(user, now)?;

        let key = counter_key(user.id, bucket_start(now.timestamp(), limits.window_seconds));

        // An absent key and an unparseable stored value both read as zero.
        let current_count = self
            .store
            .get(&key)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);

        let seconds_until_reset = self.store.ttl(&key).await?;

        debug!(
            user_id = %user.id,
            %key,
            current_count,
            seconds_until_reset,
            "stats projected"
        );

        Ok(RateLimitStats {
            id: user.id,
            tier: user.tier.clone(),
            limit: limits.limit,
            window_seconds: limits.window_seconds,
            current_count,
            seconds_until_reset,
            override_active: limits.override_active,
        })
    }
}
