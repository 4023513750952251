//! Transaction security policy
//!
//! Sliding-window rate limiting, per-transaction spending limits with a
//! confirmation threshold, and the `SecurityManager` that combines spending
//! policy with wallet encryption.

pub mod error;
pub mod manager;
pub mod rate_limit;
pub mod spending;

pub use error::{Error, Result};
pub use manager::{SecurityManager, SpendingLimits, TransactionCheck};
pub use rate_limit::{RateLimitStats, RateLimiter, RateLimiterSet};
pub use spending::{
    DEFAULT_CONFIRMATION_THRESHOLD, DEFAULT_SPENDING_LIMIT, NATIVE_DENOM, check_spending_limit,
    confirmation_message, confirmation_required,
};
