//! Tier policies and effective-limit resolution.
//!
//! Every tier maps to a request budget over a window. A per-user override
//! supersedes the tier while it is active; expired or partially populated
//! overrides fall back to the tier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::defaults;
use crate::error::AppError;
use crate::types::User;

/// Request budget for one subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub requests: i64,
    pub window_seconds: i64,
}

/// Tier -> policy registry. Immutable after init; changing a policy
/// requires a restart.
#[derive(Debug, Clone)]
pub struct TierPolicies {
    policies: HashMap<String, TierPolicy>,
}

/// Limit and window in force for one user at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveLimits {
    pub limit: i64,
    pub window_seconds: i64,
    pub override_active: bool,
}

impl TierPolicies {
    pub fn new(policies: HashMap<String, TierPolicy>) -> Self {
        Self { policies }
    }

    /// The built-in tier table.
    pub fn standard() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            "free".to_string(),
            TierPolicy {
                requests: defaults::FREE_TIER_REQUESTS,
                window_seconds: defaults::FREE_TIER_WINDOW_SECS,
            },
        );
        policies.insert(
            "premium".to_string(),
            TierPolicy {
                requests: defaults::PREMIUM_TIER_REQUESTS,
                window_seconds: defaults::PREMIUM_TIER_WINDOW_SECS,
            },
        );
        Self::new(policies)
    }

    /// Policy for a tier literal. Lookup is exact; no case or whitespace
    /// normalization.
    pub fn get(&self, tier: &str) -> Option<TierPolicy> {
        self.policies.get(tier).copied()
    }

    /// Resolve the limit and window in force for `user` at `now`.
    ///
    /// An unexpired override wins. A partial override never reaches this
    /// point (the row read folds it to `None`), so tier fallback covers
    /// both the no-override and expired-override cases.
    pub fn resolve(&self, user: &User, now: DateTime<Utc>) -> Result<EffectiveLimits, AppError> {
        let limits = match user.rate_override.filter(|o| o.is_active(now)) {
            Some(active) => EffectiveLimits {
                limit: active.limit,
                window_seconds: active.window_seconds,
                override_active: true,
            },
            None => {
                let policy = self.get(&user.tier).ok_or_else(|| {
                    AppError::Config(format!("Config missing for tier {}", user.tier))
                })?;
                EffectiveLimits {
                    limit: policy.requests,
                    window_seconds: policy.window_seconds,
                    override_active: false,
                }
            }
        };

        if limits.window_seconds <= 0 {
            return Err(AppError::Config("Invalid windowSeconds".to_string()));
        }

        Ok(limits)
    }
}
