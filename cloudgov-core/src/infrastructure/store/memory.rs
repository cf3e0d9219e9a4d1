//! In-memory shared store for development/single instance

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::debug;

use super::{ScanPage, SharedStore, StoreError, compile_glob, effective_ttl};

/// In-memory storage entry with expiration
#[derive(Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
    /// Insertion sequence; scan cursors walk entries in this order
    seq: u64,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, MemoryEntry>,
    /// `seq -> key` for every entry in `entries`
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl MemoryState {
    fn live(&self, key: &str, now: Instant) -> Option<&MemoryEntry> {
        self.entries.get(key).filter(|entry| entry.is_live(now))
    }

    /// Insert or overwrite; an overwritten key keeps its scan position
    fn put(&mut self, key: &str, value: Vec<u8>, expires_at: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.order.insert(seq, key.to_string());
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }
}

/// Process-local store
///
/// Offers the same atomicity as the Dragonfly backend within one process:
/// compare-and-swap runs under the write lock. Like Redis SCAN, a scan
/// cursor stays valid while keys are deleted between pages.
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    fn expiry(ttl_secs: u64) -> Instant {
        Instant::now() + Duration::from_secs(effective_ttl(ttl_secs))
    }

    /// Remove expired entries
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        debug!(removed = expired.len(), "Completed in-memory store cleanup");
    }

    /// Periodically purge expired entries
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = interval(every);

            loop {
                interval.tick().await;
                self.cleanup().await;
            }
        });
    }

    /// Number of stored entries, expired ones included until cleanup
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .live(key, Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.put(key, value.to_vec(), Self::expiry(ttl_secs));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.state.write().await.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut state = self.state.write().await;
        let deleted = keys
            .iter()
            .filter_map(|key| state.remove(key))
            .filter(|entry| entry.is_live(now))
            .count();
        Ok(deleted as u64)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StoreError> {
        let matcher = compile_glob(pattern)?;
        let now = Instant::now();
        let state = self.state.read().await;

        // The cursor is the next insertion sequence to visit
        let mut keys = Vec::new();
        let mut visited = 0;
        let mut next_cursor = 0;
        for (seq, key) in state.order.range(cursor.max(1)..) {
            if visited == count.max(1) {
                next_cursor = *seq;
                break;
            }
            visited += 1;

            if state.live(key, now).is_some() && matcher.is_match(key.as_str()) {
                keys.push(key.clone());
            }
        }

        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let current = state
            .live(key, Instant::now())
            .map(|entry| entry.value.as_slice());

        if current != expected {
            return Ok(false);
        }

        state.put(key, new_value.to_vec(), Self::expiry(ttl_secs));
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
