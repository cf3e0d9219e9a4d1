//! Rate limiter types and core data structures

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::infrastructure::store::StoreError;

/// Token bucket state for a single (service, account) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    /// Current number of tokens in the bucket
    pub tokens: f64,
    /// Last time the bucket was refilled (Unix timestamp in milliseconds)
    pub last_refill: u64,
}

impl BucketState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCheck {
    /// Whether a request may proceed now
    pub allowed: bool,
    /// Whole tokens left after projection (only set when allowed)
    pub remaining_tokens: Option<u32>,
    /// Seconds until one token is available (only set when denied)
    pub retry_after: Option<u64>,
}

impl RateLimitCheck {
    pub fn allowed(remaining_tokens: u32) -> Self {
        Self {
            allowed: true,
            remaining_tokens: Some(remaining_tokens),
            retry_after: None,
        }
    }

    /// Allowed without any knowledge of the bucket (limiter disabled or store down)
    pub fn unrestricted() -> Self {
        Self {
            allowed: true,
            remaining_tokens: None,
            retry_after: None,
        }
    }

    pub fn denied(retry_after: u64) -> Self {
        Self {
            allowed: false,
            remaining_tokens: None,
            retry_after: Some(retry_after),
        }
    }
}

/// Administrative snapshot of a bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub service: String,
    pub account_id: String,
    pub current_tokens: f64,
    pub burst_size: u32,
    pub requests_per_second: f64,
    pub utilization_percent: f64,
    /// Whether `check_rate_limit` would allow a request right now
    pub allowed: bool,
    /// Seconds until a token is available, when not allowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Store key of the bucket for `(service, account_id)`
pub fn bucket_key(prefix: &str, service: &str, account_id: &str) -> String {
    format!("{}:{}:{}", prefix, service, account_id)
}

/// Get current time in milliseconds since Unix epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
