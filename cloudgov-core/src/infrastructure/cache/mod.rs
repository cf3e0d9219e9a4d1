//! Cache-aside layer
//!
//! Category-scoped TTLs, namespaced keys and pattern invalidation over the
//! shared store.

pub mod keys;
pub mod service;

pub use keys::{CACHE_NAMESPACE, generate_cache_key, encode_key_component};
pub use service::{CacheService, CacheSource, CacheStats, Fetched, PendingCacheWrite};
