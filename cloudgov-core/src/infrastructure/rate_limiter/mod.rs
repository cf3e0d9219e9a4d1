//! Rate Limiting Infrastructure
//!
//! This module provides distributed rate limiting for upstream cloud APIs:
//! - One token bucket per (service, account) pair
//! - Per-service rate and burst limits with a conservative default
//! - Atomic bucket updates through the shared store's compare-and-swap
//! - Fail-open behavior when the store is unreachable

pub mod service;
pub mod token_bucket;
pub mod types;

pub use service::RateLimiterService;
pub use types::{BucketState, RateLimitCheck, RateLimitStatus};
