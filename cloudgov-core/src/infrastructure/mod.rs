//! Infrastructure Layer - External concerns and implementations
//!
//! Shared store backends, distributed rate limiting, caching and the remote
//! query pipeline.

pub mod cache;
pub mod rate_limiter;
pub mod resource_graph;
pub mod store;

pub use cache::{CacheService, CacheSource, CacheStats, Fetched, PendingCacheWrite};
pub use rate_limiter::{RateLimitCheck, RateLimitStatus, RateLimiterService};
pub use resource_graph::{AzureResourceGraphClient, QueryExecutor};
pub use store::{DragonflyStore, InMemoryStore, SharedStore, StoreError};
