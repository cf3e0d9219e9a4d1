//! Cache service implementation
//!
//! Cache-aside over the shared store. Values are stored as JSON with a TTL
//! chosen by their category. The cache is an optimization only: when the
//! store misbehaves every operation degrades to going straight to the source
//! and nothing is surfaced to the caller.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::keys::{
    CACHE_NAMESPACE, account_key, account_of, category_of, encode_key_component,
    generate_cache_key, namespaced_pattern,
};
use crate::config::CacheConfig;
use crate::domain::CacheCategory;
use crate::infrastructure::store::{SharedStore, StoreError, compile_glob};

/// Where the value returned by `get_or_set` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Served from the store or from a write still in flight
    Hit,
    /// Fetched from the source; a write-back was started
    Miss,
    /// Fetched from the source without touching the cache (disabled or store down)
    Bypassed,
}

/// Background write of a freshly fetched value
///
/// Dropping the handle detaches the task; the write still completes and any
/// failure is logged by the task itself.
#[derive(Debug)]
pub struct PendingCacheWrite {
    key: String,
    handle: JoinHandle<()>,
}

impl PendingCacheWrite {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the write has landed (or failed and been logged)
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            warn!(key = %self.key, "Cache write task did not complete: {}", e);
        }
    }
}

/// Value produced by `get_or_set`
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub source: CacheSource,
    /// Set on a miss; callers may wait on it or drop it
    pub pending_write: Option<PendingCacheWrite>,
}

impl<T> Fetched<T> {
    pub fn is_hit(&self) -> bool {
        self.source == CacheSource::Hit
    }

    /// Discard the write handle, leaving the write running in the background
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Key counts under the cache namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_keys: u64,
    pub keys_by_category: BTreeMap<String, u64>,
    /// Sum of the serialized value lengths of the counted entries
    pub estimated_size_bytes: u64,
}

/// Serialized values whose background write has not landed yet
type PendingWrites = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;

/// Cache-aside service over the shared store
pub struct CacheService {
    store: Arc<dyn SharedStore>,
    config: CacheConfig,
    /// Lookups consult this before the store so a value is readable as soon
    /// as `get_or_set` returns
    pending: PendingWrites,
}

impl CacheService {
    pub fn new(store: Arc<dyn SharedStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            pending: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        self.config.ttl_for(category)
    }

    /// Return the cached value for `(category, account, identifiers)` or run
    /// `fetcher` and write its result back in the background
    ///
    /// Fetcher errors propagate unchanged and are never cached.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        category: CacheCategory,
        account_id: &str,
        identifiers: &[&str],
        fetcher: F,
    ) -> Result<Fetched<T>, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return Ok(Fetched {
                value: fetcher().await?,
                source: CacheSource::Bypassed,
                pending_write: None,
            });
        }

        let key = generate_cache_key(category, account_id, identifiers);

        match self.lookup(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(Fetched {
                        value,
                        source: CacheSource::Hit,
                        pending_write: None,
                    });
                }
                Err(e) => {
                    warn!(key = %key, "Discarding corrupt cache entry: {}", e);
                    self.delete(&key).await;
                }
            },
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => {
                warn!(key = %key, "Cache lookup failed, bypassing cache: {}", e);
                return Ok(Fetched {
                    value: fetcher().await?,
                    source: CacheSource::Bypassed,
                    pending_write: None,
                });
            }
        }

        let value = fetcher().await?;
        let pending_write = self.spawn_write(key, &value, self.ttl_for(category)).await;

        Ok(Fetched {
            value,
            source: CacheSource::Miss,
            pending_write,
        })
    }

    /// Pending write for `key` if any, otherwise the store
    async fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(bytes) = self.pending.read().await.get(key) {
            debug!(key = %key, "Serving value from in-flight cache write");
            return Ok(Some(bytes.to_vec()));
        }
        self.store.get(key).await
    }

    /// Register `value` as pending and write it to the store in the background
    ///
    /// The task holds a read lock on the pending map while it writes, so an
    /// invalidation either drops the value before the write starts or waits
    /// for it to land and then deletes it from the store.
    async fn spawn_write<T: Serialize>(
        &self,
        key: String,
        value: &T,
        ttl: Duration,
    ) -> Option<PendingCacheWrite> {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                warn!(key = %key, "Failed to serialize value for cache: {}", e);
                return None;
            }
        };

        self.pending
            .write()
            .await
            .insert(key.clone(), Arc::clone(&bytes));

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            {
                let in_flight = pending.read().await;
                let current = in_flight
                    .get(&task_key)
                    .is_some_and(|queued| Arc::ptr_eq(queued, &bytes));
                if !current {
                    debug!(key = %task_key, "Cache write superseded before it started");
                    return;
                }

                match store.set(&task_key, &bytes, ttl.as_secs()).await {
                    Ok(()) => debug!(key = %task_key, ttl_secs = ttl.as_secs(), "Cached value"),
                    Err(e) => warn!(key = %task_key, "Failed to write cache entry: {}", e),
                }
            }

            let mut in_flight = pending.write().await;
            if in_flight
                .get(&task_key)
                .is_some_and(|queued| Arc::ptr_eq(queued, &bytes))
            {
                in_flight.remove(&task_key);
            }
        });

        Some(PendingCacheWrite { key, handle })
    }

    async fn forget_pending(&self, key: &str) {
        self.pending.write().await.remove(key);
    }

    /// Read and deserialize `key`; corrupt entries are deleted and reported as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.lookup(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, "Cache get failed: {}", e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, "Discarding corrupt cache entry: {}", e);
                self.delete(key).await;
                None
            }
        }
    }

    /// Write `value` under `key` for `ttl`
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.forget_pending(key).await;
        let result = match serde_json::to_vec(value) {
            Ok(bytes) => self.store.set(key, &bytes, ttl.as_secs()).await,
            Err(e) => Err(StoreError::Serialization(e.to_string())),
        };

        if let Err(e) = result {
            warn!(key = %key, "Cache set failed: {}", e);
        }
    }

    pub async fn delete(&self, key: &str) {
        self.forget_pending(key).await;
        if let Err(e) = self.store.delete(key).await {
            warn!(key = %key, "Cache delete failed: {}", e);
        }
    }

    /// Delete every key matching `pattern` (namespace prefixed automatically)
    ///
    /// Each SCAN page is deleted before the next one is fetched, so memory
    /// stays bounded by the page size. Returns the number of keys deleted;
    /// store failures end the sweep early and are logged.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let pattern = namespaced_pattern(pattern);

        match compile_glob(&pattern) {
            Ok(matcher) => self
                .pending
                .write()
                .await
                .retain(|key, _| !matcher.is_match(key.as_str())),
            Err(e) => warn!(pattern = %pattern, "Skipping in-flight cache writes: {}", e),
        }

        let mut deleted = 0;
        let mut cursor = 0;
        'sweep: loop {
            let page = match self
                .store
                .scan(cursor, &pattern, self.config.scan_page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(pattern = %pattern, "Cache invalidation scan failed: {}", e);
                    break;
                }
            };

            for batch in page.keys.chunks(self.config.delete_batch_size.max(1)) {
                match self.store.delete_many(batch).await {
                    Ok(count) => deleted += count,
                    Err(e) => {
                        warn!(pattern = %pattern, "Cache invalidation delete failed: {}", e);
                        break 'sweep;
                    }
                }
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = deleted, "Invalidated cache entries");
        deleted
    }

    /// Collect every key matching `pattern`, one bounded SCAN page at a time
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self
                .store
                .scan(cursor, pattern, self.config.scan_page_size)
                .await?;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Drop everything cached for one account in every category
    pub async fn invalidate_account(&self, account_id: &str) -> u64 {
        let mut deleted = 0;
        for category in CacheCategory::ALL {
            deleted += self.invalidate_category(category, Some(account_id)).await;
        }

        info!(
            account_id = %account_id,
            deleted = deleted,
            "Invalidated account cache"
        );
        deleted
    }

    /// Drop one category, for a single account or for all of them
    pub async fn invalidate_category(
        &self,
        category: CacheCategory,
        account_id: Option<&str>,
    ) -> u64 {
        match account_id {
            Some(account_id) => {
                let prefix = account_key(category, account_id);
                let mut deleted = self.invalidate(&format!("{}:*", prefix)).await;

                // Entries cached without identifiers live at the bare prefix
                self.forget_pending(&prefix).await;
                match self.store.delete_many(&[prefix.clone()]).await {
                    Ok(count) => deleted += count,
                    Err(e) => warn!(key = %prefix, "Cache delete failed: {}", e),
                }
                deleted
            }
            None => {
                self.invalidate(&format!("{}:*", category.as_str()))
                    .await
            }
        }
    }

    /// Count cached keys, optionally restricted to one account
    pub async fn get_stats(&self, account_id: Option<&str>) -> CacheStats {
        let keys = match self.scan_keys(&format!("{}:*", CACHE_NAMESPACE)).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache stats scan failed: {}", e);
                return CacheStats::default();
            }
        };

        let account_filter = account_id.map(encode_key_component);
        let mut stats = CacheStats::default();

        for key in keys {
            if let Some(account) = &account_filter
                && account_of(&key) != Some(account.as_str())
            {
                continue;
            }

            let value_len = match self.store.get(&key).await {
                Ok(Some(bytes)) => bytes.len() as u64,
                // Expired between the scan and the read
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, "Cache stats read failed: {}", e);
                    0
                }
            };

            let category = category_of(&key).unwrap_or("unknown").to_string();
            *stats.keys_by_category.entry(category).or_insert(0) += 1;
            stats.total_keys += 1;
            stats.estimated_size_bytes += value_len;
        }

        stats
    }

    /// Populate an entry ahead of demand; failures are logged and dropped
    pub async fn warm_up<T, E, F, Fut>(
        &self,
        category: CacheCategory,
        account_id: &str,
        identifiers: &[&str],
        fetcher: F,
    ) where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self
            .get_or_set(category, account_id, identifiers, fetcher)
            .await
        {
            Ok(fetched) => {
                if let Some(pending) = fetched.pending_write {
                    pending.wait().await;
                }
                debug!(
                    category = %category,
                    account_id = %account_id,
                    "Cache warm-up completed"
                );
            }
            Err(e) => warn!(
                category = %category,
                account_id = %account_id,
                "Cache warm-up failed: {}",
                e
            ),
        }
    }
}
