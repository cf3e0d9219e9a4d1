//! Rate Limiter Service
//!
//! Coordinates per-(service, account) token buckets for every upstream API
//! the access layer calls. Store failures never block a request: checks fail
//! open and consumption failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::token_bucket::{TokenBucket, decide, utilization_percent};
use super::types::{RateLimitCheck, RateLimitStatus, bucket_key};
use crate::config::RateLimitConfig;
use crate::domain::ResourceGraphError;
use crate::infrastructure::store::SharedStore;

/// Backoff used by `wait_for_rate_limit` when a denial carries no hint
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Main rate limiter service
pub struct RateLimiterService {
    bucket: TokenBucket,
    config: RateLimitConfig,
}

impl RateLimiterService {
    pub fn new(store: Arc<dyn SharedStore>, config: RateLimitConfig) -> Self {
        let bucket = TokenBucket::new(store, config.max_consume_retries);
        Self { bucket, config }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn key(&self, service: &str, account_id: &str) -> String {
        bucket_key(&self.config.key_prefix, service, account_id)
    }

    /// Whether `account_id` may call `service` right now
    ///
    /// Never consumes a token.
    pub async fn check_rate_limit(&self, service: &str, account_id: &str) -> RateLimitCheck {
        if !self.config.enabled {
            return RateLimitCheck::unrestricted();
        }

        let limit = self.config.limit_for(service);
        match self.bucket.check(&self.key(service, account_id), &limit).await {
            Ok(check) => check,
            Err(e) => {
                warn!(
                    service = %service,
                    account_id = %account_id,
                    "Failed to read token bucket state, allowing request: {}",
                    e
                );
                RateLimitCheck::unrestricted()
            }
        }
    }

    /// Record one completed call against the bucket
    pub async fn consume_token(&self, service: &str, account_id: &str) {
        if !self.config.enabled {
            return;
        }

        let limit = self.config.limit_for(service);
        if let Err(e) = self
            .bucket
            .consume(&self.key(service, account_id), &limit)
            .await
        {
            warn!(
                service = %service,
                account_id = %account_id,
                "Failed to consume rate limit token: {}",
                e
            );
        }
    }

    /// Poll until a token is available or `max_wait` (default from config) elapses
    ///
    /// Sleeps for the denial's retry hint, or an exponential backoff capped at
    /// five seconds, and never sleeps past the deadline.
    pub async fn wait_for_rate_limit(
        &self,
        service: &str,
        account_id: &str,
        max_wait: Option<Duration>,
    ) -> Result<(), ResourceGraphError> {
        let max_wait =
            max_wait.unwrap_or_else(|| Duration::from_secs(self.config.max_wait_seconds));
        let deadline = Instant::now() + max_wait;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let check = self.check_rate_limit(service, account_id).await;
            if check.allowed {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ResourceGraphError::RateLimitExceeded {
                    service: service.to_string(),
                    account_id: account_id.to_string(),
                    retry_after_seconds: check.retry_after.unwrap_or(1),
                });
            }

            let delay = match check.retry_after {
                Some(secs) => Duration::from_secs(secs),
                None => {
                    let delay = backoff;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    delay
                }
            };
            let delay = delay.min(deadline - now);

            debug!(
                service = %service,
                account_id = %account_id,
                delay_ms = delay.as_millis() as u64,
                "Waiting for rate limit"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Delete the bucket so the next call starts from a full one
    pub async fn reset_rate_limit(&self, service: &str, account_id: &str) {
        if let Err(e) = self.bucket.reset(&self.key(service, account_id)).await {
            warn!(
                service = %service,
                account_id = %account_id,
                "Failed to reset rate limit: {}",
                e
            );
        }
    }

    /// Current projected bucket level; a full bucket when the store is unreachable
    ///
    /// `allowed` and `retry_after` match what `check_rate_limit` would answer.
    pub async fn get_rate_limit_status(&self, service: &str, account_id: &str) -> RateLimitStatus {
        let limit = self.config.limit_for(service);
        let current_tokens = match self
            .bucket
            .projected_tokens(&self.key(service, account_id), &limit)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(
                    service = %service,
                    account_id = %account_id,
                    "Failed to read token bucket state for status: {}",
                    e
                );
                limit.burst_size as f64
            }
        };

        let check = if self.config.enabled {
            decide(current_tokens, &limit)
        } else {
            RateLimitCheck::unrestricted()
        };

        RateLimitStatus {
            service: service.to_string(),
            account_id: account_id.to_string(),
            current_tokens,
            burst_size: limit.burst_size,
            requests_per_second: limit.requests_per_second,
            utilization_percent: utilization_percent(current_tokens, limit.burst_size),
            allowed: check.allowed,
            retry_after: check.retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceRateLimit;
    use crate::infrastructure::store::InMemoryStore;

    fn service_with(config: RateLimitConfig) -> RateLimiterService {
        RateLimiterService::new(Arc::new(InMemoryStore::new()), config)
    }

    fn limiter() -> RateLimiterService {
        service_with(RateLimitConfig::default())
    }

    #[tokio::test]
    async fn test_fresh_bucket_is_full() {
        let limiter = limiter();
        let check = limiter
            .check_rate_limit("azure-resource-graph", "acct-1")
            .await;
        assert!(check.allowed);
        assert_eq!(check.remaining_tokens, Some(20));

        let status = limiter
            .get_rate_limit_status("azure-resource-graph", "acct-1")
            .await;
        assert_eq!(status.current_tokens, 20.0);
        assert_eq!(status.utilization_percent, 0.0);
        assert!(status.allowed);
        assert!(status.retry_after.is_none());
    }

    #[tokio::test]
    async fn test_check_does_not_consume() {
        let limiter = limiter();
        for _ in 0..50 {
            limiter.check_rate_limit("aws-cost-explorer", "acct-1").await;
        }
        let status = limiter
            .get_rate_limit_status("aws-cost-explorer", "acct-1")
            .await;
        assert_eq!(status.current_tokens, 10.0);
    }

    #[tokio::test]
    async fn test_burst_exhaustion_denies_with_retry_hint() {
        let limiter = limiter();
        for _ in 0..20 {
            limiter
                .consume_token("azure-resource-graph", "acct-1")
                .await;
        }

        let check = limiter
            .check_rate_limit("azure-resource-graph", "acct-1")
            .await;
        assert!(!check.allowed);
        assert!(check.retry_after.unwrap() > 0);

        let status = limiter
            .get_rate_limit_status("azure-resource-graph", "acct-1")
            .await;
        assert!(!status.allowed);
        assert_eq!(status.retry_after, check.retry_after);
        assert!(status.utilization_percent > 95.0);
    }

    #[tokio::test]
    async fn test_disabled_limiter_always_allows() {
        let limiter = service_with(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        for _ in 0..30 {
            limiter
                .consume_token("azure-cost-management", "acct-1")
                .await;
        }
        assert!(
            limiter
                .check_rate_limit("azure-cost-management", "acct-1")
                .await
                .allowed
        );
        let status = limiter
            .get_rate_limit_status("azure-cost-management", "acct-1")
            .await;
        assert_eq!(status.current_tokens, 8.0);
        assert!(status.allowed);
    }

    #[tokio::test]
    async fn test_reset_restores_full_bucket() {
        let limiter = limiter();
        for _ in 0..8 {
            limiter
                .consume_token("azure-cost-management", "acct-1")
                .await;
        }
        assert!(
            !limiter
                .check_rate_limit("azure-cost-management", "acct-1")
                .await
                .allowed
        );

        limiter
            .reset_rate_limit("azure-cost-management", "acct-1")
            .await;
        let check = limiter
            .check_rate_limit("azure-cost-management", "acct-1")
            .await;
        assert_eq!(check.remaining_tokens, Some(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let mut config = RateLimitConfig::default();
        config
            .services
            .insert("slow-api".to_string(), ServiceRateLimit::new(0.01, 1));
        let limiter = service_with(config);
        limiter.consume_token("slow-api", "acct-1").await;

        let started = Instant::now();
        let err = limiter
            .wait_for_rate_limit("slow-api", "acct-1", Some(Duration::from_secs(3)))
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceGraphError::RateLimitExceeded { .. }));
        assert!(err.retry_after().unwrap() > 0);
        // The 100s hint is capped at the remaining budget
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_allowed() {
        let limiter = limiter();
        limiter
            .wait_for_rate_limit("azure-resource-graph", "acct-1", None)
            .await
            .unwrap();
    }
}
