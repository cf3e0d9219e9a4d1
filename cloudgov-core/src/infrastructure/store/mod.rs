//! Shared Store
//!
//! Key-value contract that the rate limiter and the cache layer synchronize
//! through, with two backends:
//! - Dragonfly/Redis for distributed, production use
//! - In-memory for development and single-instance deployments

pub mod dragonfly;
pub mod memory;

pub use dragonfly::DragonflyStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{StoreBackend, StoreConfig};

/// Store I/O failure
///
/// Never reaches callers of the access layer; the rate limiter and cache
/// log and absorb it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

/// One page of a cursor-based scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` when the scan is complete
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Key-value store shared by every process instance
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` with an expiry of `ttl_secs` (at least one second)
    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete several keys, returning how many existed
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Walk keys matching a glob `pattern`, `count` keys per page (hint)
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> Result<ScanPage, StoreError>;

    /// Atomically replace `key` with `new_value` if its current value is
    /// `expected` (`None` meaning absent). Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Build the configured store, falling back to the in-memory backend when
/// Dragonfly is unreachable at startup
pub async fn connect(config: &StoreConfig) -> Arc<dyn SharedStore> {
    match config.backend {
        StoreBackend::Dragonfly => {
            let timeout = Duration::from_secs(config.connection_timeout_seconds);
            match DragonflyStore::new(&config.url, timeout).await {
                Ok(store) => {
                    info!("Shared store using Dragonfly backend at {}", config.url);
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(
                        "Failed to connect to Dragonfly, falling back to in-memory store: {}",
                        e
                    );
                    start_memory_store(config)
                }
            }
        }
        StoreBackend::Memory => {
            info!("Shared store using in-memory backend");
            start_memory_store(config)
        }
    }
}

fn start_memory_store(config: &StoreConfig) -> Arc<dyn SharedStore> {
    let store = Arc::new(InMemoryStore::new());
    Arc::clone(&store).start_cleanup_task(Duration::from_secs(config.cleanup_interval_seconds));
    debug!("Started in-memory store cleanup task");
    store
}

/// Compile a Redis-style glob (`*`, `?`, `[..]`, `\` escapes) where `*`
/// also crosses `:` separators
pub(crate) fn compile_glob(pattern: &str) -> Result<GlobMatcher, StoreError> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| StoreError::Command(format!("Invalid scan pattern '{}': {}", pattern, e)))
}

/// Clamp a TTL to what SET EX accepts
pub(crate) fn effective_ttl(ttl_secs: u64) -> u64 {
    ttl_secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_glob_crosses_separators() {
        let matcher = compile_glob("cloudgov:costs:*").unwrap();
        assert!(matcher.is_match("cloudgov:costs:acct-1:monthly"));
        assert!(!matcher.is_match("cloudgov:resources:acct-1"));
        assert!(compile_glob("cloudgov:[").is_err());
    }

    #[test]
    fn test_effective_ttl_never_zero() {
        assert_eq!(effective_ttl(0), 1);
        assert_eq!(effective_ttl(900), 900);
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let store = connect(&config).await;
        store.set("k", b"v", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_connect_falls_back_when_dragonfly_unreachable() {
        let config = StoreConfig {
            backend: StoreBackend::Dragonfly,
            url: "redis://127.0.0.1:1".to_string(),
            connection_timeout_seconds: 1,
            ..StoreConfig::default()
        };
        let store = connect(&config).await;
        assert!(store.ping().await.is_ok());
    }
}
