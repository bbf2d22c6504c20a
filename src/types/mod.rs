//! Type definitions

pub mod rate_limit;
pub mod user;

pub use rate_limit::*;
pub use user::*;
