//! Static tier policy defaults. Changing these requires a restart.

pub const FREE_TIER_REQUESTS: i64 = 10;
pub const FREE_TIER_WINDOW_SECS: i64 = 60;

pub const PREMIUM_TIER_REQUESTS: i64 = 100;
pub const PREMIUM_TIER_WINDOW_SECS: i64 = 60;
