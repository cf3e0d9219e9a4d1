//! Token Bucket Rate Limiter
//!
//! Implements the token bucket algorithm over the shared store.
//! Tokens are added to the bucket at a constant rate, and each successful
//! upstream call consumes one token. If the bucket is empty, the call is
//! rejected with a retry hint.
//!
//! Refill is lazy: the stored state is only `{tokens, last_refill}` and every
//! read projects it forward to the current time.

use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{BucketState, RateLimitCheck, current_time_millis};
use crate::config::ServiceRateLimit;
use crate::infrastructure::store::{SharedStore, StoreError};

/// Token bucket rate limiter
pub struct TokenBucket {
    store: Arc<dyn SharedStore>,
    max_consume_retries: u32,
}

impl TokenBucket {
    /// Create a new token bucket rate limiter
    ///
    /// # Arguments
    /// * `store` - Shared store holding every bucket
    /// * `max_consume_retries` - Compare-and-swap attempts per consumption
    pub fn new(store: Arc<dyn SharedStore>, max_consume_retries: u32) -> Self {
        Self {
            store,
            max_consume_retries: max_consume_retries.max(1),
        }
    }

    /// Load the stored state, treating a corrupt value as absent
    async fn load(&self, key: &str) -> Result<(Option<Vec<u8>>, Option<BucketState>), StoreError> {
        let raw = self.store.get(key).await?;
        let state = match raw.as_deref().map(BucketState::from_bytes) {
            Some(Ok(state)) => Some(state),
            Some(Err(e)) => {
                warn!(key = %key, "Discarding unreadable token bucket state: {}", e);
                None
            }
            None => None,
        };
        Ok((raw, state))
    }

    /// Token level of the bucket at the current time, without persisting it
    pub async fn projected_tokens(
        &self,
        key: &str,
        limit: &ServiceRateLimit,
    ) -> Result<f64, StoreError> {
        let (_, state) = self.load(key).await?;
        Ok(project(state, limit, current_time_millis()))
    }

    /// Decide whether one more request fits in the bucket (pure read)
    pub async fn check(
        &self,
        key: &str,
        limit: &ServiceRateLimit,
    ) -> Result<RateLimitCheck, StoreError> {
        let projected = self.projected_tokens(key, limit).await?;
        let check = decide(projected, limit);

        match check.retry_after {
            None => debug!(
                key = %key,
                remaining = check.remaining_tokens.unwrap_or(0),
                burst = limit.burst_size,
                "Rate limit check passed"
            ),
            Some(retry_after) => debug!(
                key = %key,
                tokens = projected,
                retry_after = retry_after,
                "Rate limit exceeded"
            ),
        }
        Ok(check)
    }

    /// Take one token, persisting the refilled and decremented state
    ///
    /// Runs as an optimistic loop: the write only lands if the bucket still
    /// holds the value the projection was computed from.
    pub async fn consume(
        &self,
        key: &str,
        limit: &ServiceRateLimit,
    ) -> Result<BucketState, StoreError> {
        let ttl = cleanup_ttl_secs(limit);

        for attempt in 1..=self.max_consume_retries {
            let (raw, state) = self.load(key).await?;
            let now = current_time_millis();
            let projected = project(state, limit, now);

            let next = BucketState {
                tokens: (projected - 1.0).max(0.0),
                last_refill: now,
            };

            if self
                .store
                .compare_and_swap(key, raw.as_deref(), &next.to_bytes()?, ttl)
                .await?
            {
                debug!(
                    key = %key,
                    tokens = next.tokens,
                    attempt = attempt,
                    "Consumed rate limit token"
                );
                return Ok(next);
            }

            debug!(key = %key, attempt = attempt, "Token bucket changed concurrently, retrying");
        }

        Err(StoreError::Command(format!(
            "Gave up consuming a token for {} after {} concurrent updates",
            key, self.max_consume_retries
        )))
    }

    /// Drop the bucket; the next request sees a full one
    pub async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(key).await
    }
}

/// Project a stored state forward to `now`
///
/// An absent bucket is full. The result always lies in `0..=burst_size`.
pub fn project(state: Option<BucketState>, limit: &ServiceRateLimit, now: u64) -> f64 {
    let burst = limit.burst_size as f64;
    match state {
        Some(state) => {
            let elapsed_ms = now.saturating_sub(state.last_refill);
            let tokens_to_add = elapsed_ms as f64 / 1000.0 * limit.requests_per_second;
            (state.tokens + tokens_to_add).clamp(0.0, burst)
        }
        None => burst,
    }
}

/// Allow while a whole token is projected, otherwise deny with a retry hint
pub fn decide(projected: f64, limit: &ServiceRateLimit) -> RateLimitCheck {
    if projected >= 1.0 {
        RateLimitCheck::allowed(projected.floor() as u32)
    } else {
        RateLimitCheck::denied(retry_after_secs(projected, limit.requests_per_second))
    }
}

/// Seconds until the bucket holds one whole token (at least 1)
pub fn retry_after_secs(projected: f64, requests_per_second: f64) -> u64 {
    let missing = (1.0 - projected).max(0.0);
    ((missing / requests_per_second).ceil() as u64).max(1)
}

/// Store expiry for a bucket: twice the time a full refill takes
pub fn cleanup_ttl_secs(limit: &ServiceRateLimit) -> u64 {
    let secs = (2.0 * limit.burst_size as f64 / limit.requests_per_second).ceil();
    (secs as u64).max(1)
}

/// Share of the burst currently spent, in percent
pub fn utilization_percent(current_tokens: f64, burst_size: u32) -> f64 {
    if burst_size == 0 {
        return 0.0;
    }
    let burst = burst_size as f64;
    (burst - current_tokens) / burst * 100.0
}
