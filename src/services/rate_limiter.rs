//! Rate-limit decision engine.
//!
//! The engine owns no state of its own: it resolves the user's effective
//! limits, bumps the shared windowed counter, and classifies the result.
//! The clock is read exactly once per decision, so the resolver and the
//! bucket key can never disagree about "now".

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::cache::CounterStore;
use crate::clock::Clock;
use crate::error::AppError;
use crate::services::limits::TierPolicies;
use crate::types::{Decision, User};

/// Prefix of every counter key this service owns. No other keyspace in the
/// shared store is read or written.
const KEY_PREFIX: &str = "rate_limit";

/// Start of the bucket containing `now_seconds`, aligned to `window_seconds`.
pub(crate) fn bucket_start(now_seconds: i64, window_seconds: i64) -> i64 {
    now_seconds.div_euclid(window_seconds) * window_seconds
}

/// Counter key for one user and one bucket.
pub(crate) fn counter_key(user_id: Uuid, window_start: i64) -> String {
    format!("{KEY_PREFIX}:{user_id}:{window_start}")
}

/// Tier-aware rate limiter over a shared counter store.
pub struct RateLimiter {
    pub(crate) store: Arc<dyn CounterStore>,
    pub(crate) policies: Arc<TierPolicies>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        policies: Arc<TierPolicies>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policies,
            clock,
        }
    }

    /// Decide whether one more request fits the user's current bucket.
    ///
    /// The counter is incremented before the comparison, so a denied
    /// request still counts against the bucket, and the caller retrying a
    /// failed-but-allowed request is counted again.
    pub async fn check(&self, user: &User) -> Result<Decision, AppError> {
        let now = self.clock.now();
        let limits = self.policies.resolve(user, now)?;

        let window_start = bucket_start(now.timestamp(), limits.window_seconds);
        let key = counter_key(user.id, window_start);

        let count = self
            .store
            .incr_and_expire(&key, limits.window_seconds)
            .await?;

        if count <= limits.limit {
            debug!(user_id = %user.id, %key, count, limit = limits.limit, "request allowed");
            return Ok(Decision::Allowed);
        }

        // Exceeded: the key's TTL tells the caller when the bucket resets.
        // A negative reply means the key vanished (or lost its expiry)
        // between the increment and this read; fall back to a full window.
        let ttl = self.store.ttl(&key).await?;
        let retry_after_seconds = if ttl >= 0 { ttl } else { limits.window_seconds };

        debug!(
            user_id = %user.id,
            %key,
            count,
            limit = limits.limit,
            retry_after_seconds,
            "request rate limited"
        );

        Ok(Decision::RateLimited {
            retry_after_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::future::join_all;

    use crate::cache::memory::MemoryCounterStore;
    use crate::clock::ManualClock;
    use crate::types::Override;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn user(tier: &str, rate_override: Option<Override>) -> User {
        User {
            id: Uuid::new_v4(),
            tier: tier.to_string(),
            rate_override,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn limiter(
        store: Arc<MemoryCounterStore>,
        clock: Arc<ManualClock>,
    ) -> RateLimiter {
        RateLimiter::new(store, Arc::new(TierPolicies::standard()), clock)
    }

    #[test]
    fn bucket_start_floors_to_window_boundary() {
        assert_eq!(bucket_start(0, 60), 0);
        assert_eq!(bucket_start(59, 60), 0);
        assert_eq!(bucket_start(60, 60), 60);
        assert_eq!(bucket_start(121, 60), 120);
        assert_eq!(bucket_start(100, 30), 90);
    }

    #[test]
    fn keys_match_exactly_within_a_bucket() {
        let id = Uuid::new_v4();
        for offset in 0..60 {
            assert_eq!(
                counter_key(id, bucket_start(offset, 60)),
                counter_key(id, bucket_start(0, 60))
            );
        }
        assert_ne!(
            counter_key(id, bucket_start(60, 60)),
            counter_key(id, bucket_start(59, 60))
        );
    }

    #[test]
    fn key_carries_prefix_user_and_window_start() {
        let id = Uuid::nil();
        assert_eq!(
            counter_key(id, 120),
            format!("rate_limit:{id}:120")
        );
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_denies() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("free", None);

        for _ in 0..10 {
            assert_eq!(limiter.check(&u).await.unwrap(), Decision::Allowed);
        }

        // The eleventh request is the first denial.
        let decision = limiter.check(&u).await.unwrap();
        assert_eq!(
            decision,
            Decision::RateLimited {
                retry_after_seconds: 60,
            }
        );
    }

    #[tokio::test]
    async fn denied_requests_still_count() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("free", None);
        let key = counter_key(u.id, 0);

        for _ in 0..12 {
            let _ = limiter.check(&u).await.unwrap();
        }

        assert_eq!(store.value(&key).as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn sequential_checks_increment_by_exactly_one() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("free", None);
        let key = counter_key(u.id, 0);

        limiter.check(&u).await.unwrap();
        let first: i64 = store.value(&key).unwrap().parse().unwrap();
        limiter.check(&u).await.unwrap();
        let second: i64 = store.value(&key).unwrap().parse().unwrap();

        assert_eq!(second - first, 1);
    }

    #[tokio::test]
    async fn retry_after_reports_remaining_ttl() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("free", None);
        let key = counter_key(u.id, 0);

        for _ in 0..10 {
            limiter.check(&u).await.unwrap();
        }
        store.set_ttl(&key, 37);

        assert_eq!(
            limiter.check(&u).await.unwrap(),
            Decision::RateLimited {
                retry_after_seconds: 37,
            }
        );
    }

    #[tokio::test]
    async fn retry_after_falls_back_to_window_on_lost_key() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("free", None);
        let key = counter_key(u.id, 0);

        for _ in 0..11 {
            limiter.check(&u).await.unwrap();
        }

        // Simulate the key expiring between the increment and the TTL read.
        store.set_ttl(&key, -2);
        assert_eq!(
            limiter.check(&u).await.unwrap(),
            Decision::RateLimited {
                retry_after_seconds: 60,
            }
        );

        // Same fallback for a key that somehow carries no expiry.
        store.set_ttl(&key, -1);
        assert_eq!(
            limiter.check(&u).await.unwrap(),
            Decision::RateLimited {
                retry_after_seconds: 60,
            }
        );
    }

    #[tokio::test]
    async fn new_bucket_starts_at_window_boundary() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock.clone());
        let u = user("free", None);

        limiter.check(&u).await.unwrap();
        clock.advance(Duration::seconds(59));
        limiter.check(&u).await.unwrap();
        assert_eq!(store.value(&counter_key(u.id, 0)).as_deref(), Some("2"));

        clock.advance(Duration::seconds(1));
        limiter.check(&u).await.unwrap();
        assert_eq!(store.value(&counter_key(u.id, 0)).as_deref(), Some("2"));
        assert_eq!(store.value(&counter_key(u.id, 60)).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn override_supersedes_tier_budget() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user(
            "free",
            Some(Override {
                limit: 2,
                window_seconds: 30,
                expires_at: at(300),
            }),
        );

        assert_eq!(limiter.check(&u).await.unwrap(), Decision::Allowed);
        assert_eq!(limiter.check(&u).await.unwrap(), Decision::Allowed);

        let decision = limiter.check(&u).await.unwrap();
        assert_eq!(
            decision,
            Decision::RateLimited {
                retry_after_seconds: 30,
            }
        );
        // The bucket was keyed by the override's window.
        assert_eq!(store.value(&counter_key(u.id, 0)).as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn expired_override_hands_back_to_tier_mid_bucket() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock.clone());
        let u = user(
            "free",
            Some(Override {
                limit: 1,
                window_seconds: 60,
                expires_at: at(2),
            }),
        );

        assert_eq!(limiter.check(&u).await.unwrap(), Decision::Allowed);

        clock.advance(Duration::milliseconds(500));
        assert!(matches!(
            limiter.check(&u).await.unwrap(),
            Decision::RateLimited { .. }
        ));

        // Past the override's expiry the tier budget applies. The window
        // length is unchanged here, so the same bucket (and its count of 2)
        // carries over, now measured against the tier limit of 10.
        clock.advance(Duration::milliseconds(2_500));
        assert_eq!(limiter.check(&u).await.unwrap(), Decision::Allowed);
        assert_eq!(store.value(&counter_key(u.id, 0)).as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn concurrent_checks_never_exceed_limit() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = Arc::new(limiter(store, clock));
        let u = user("free", None);

        let checks = (0..50).map(|_| {
            let limiter = Arc::clone(&limiter);
            let u = u.clone();
            async move { limiter.check(&u).await.unwrap() }
        });

        let decisions = join_all(checks).await;
        let allowed = decisions
            .iter()
            .filter(|d| matches!(d, Decision::Allowed))
            .count();

        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn unknown_tier_surfaces_config_error_without_counting() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(at(0)));
        let limiter = limiter(store.clone(), clock);
        let u = user("gold", None);

        let err = limiter.check(&u).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(store.keys().is_empty());
    }
}
