//! Integration tests for the cache-aside layer

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cloudgov_core::config::CacheConfig;
use cloudgov_core::domain::CacheCategory;
use cloudgov_core::infrastructure::cache::{CacheService, CacheSource, generate_cache_key};
use cloudgov_core::infrastructure::store::{DragonflyStore, InMemoryStore, SharedStore};

use common::*;

fn memory_cache() -> (Arc<InMemoryStore>, CacheService) {
    let store = Arc::new(InMemoryStore::new());
    let cache = CacheService::new(store.clone(), CacheConfig::default());
    (store, cache)
}

#[tokio::test]
async fn test_get_or_set_calls_fetcher_once() {
    let (_, cache) = memory_cache();
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let fetcher = || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(resource_rows(3))
    };

    // No wait between the calls: the write-back is still in flight
    let first = cache
        .get_or_set(CacheCategory::Resources, ACCOUNT, &["list"], fetcher)
        .await
        .unwrap();
    let second = cache
        .get_or_set(CacheCategory::Resources, ACCOUNT, &["list"], fetcher)
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(first.value, second.value);
    assert_eq!(second.source, CacheSource::Hit);
}

#[tokio::test]
async fn test_dropped_pending_write_still_lands() {
    let (_, cache) = memory_cache();

    let fetched = cache
        .get_or_set(CacheCategory::Costs, ACCOUNT, &["monthly"], || async {
            Ok::<_, String>(1234.5f64)
        })
        .await
        .unwrap();
    assert_eq!(fetched.into_value(), 1234.5);

    wait_for_cached_keys(&cache, ACCOUNT, 1).await;
    let key = generate_cache_key(CacheCategory::Costs, ACCOUNT, &["monthly"]);
    assert_eq!(cache.get::<f64>(&key).await, Some(1234.5));
}

#[tokio::test]
async fn test_non_json_value_reads_as_missing_and_is_deleted() {
    let (store, cache) = memory_cache();
    let key = generate_cache_key(CacheCategory::Security, ACCOUNT, &["findings"]);
    store.set(&key, &[0xff, 0xfe, 0x00], 300).await.unwrap();

    assert!(cache.get::<serde_json::Value>(&key).await.is_none());
    assert!(store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalidate_account_spares_other_accounts() {
    let (store, cache) = memory_cache();
    let ttl = Duration::from_secs(300);

    for category in CacheCategory::ALL {
        cache
            .set(&generate_cache_key(category, ACCOUNT, &["a"]), &1, ttl)
            .await;
        cache
            .set(&generate_cache_key(category, ACCOUNT, &["b", "c"]), &2, ttl)
            .await;
        cache
            .set(&generate_cache_key(category, OTHER_ACCOUNT, &["a"]), &3, ttl)
            .await;
    }
    cache
        .set(&generate_cache_key(CacheCategory::Accounts, ACCOUNT, &[]), &4, ttl)
        .await;
    // Shares a prefix with ACCOUNT but is a different account
    cache
        .set(
            &generate_cache_key(CacheCategory::Resources, "acct-1-shadow", &["a"]),
            &5,
            ttl,
        )
        .await;

    let deleted = cache.invalidate_account(ACCOUNT).await;
    assert_eq!(deleted, 11);

    assert_eq!(cache.get_stats(Some(ACCOUNT)).await.total_keys, 0);
    assert_eq!(cache.get_stats(Some(OTHER_ACCOUNT)).await.total_keys, 5);
    assert_eq!(store.len().await, 6);
}

#[tokio::test]
async fn test_invalidate_prefixes_namespace() {
    let (store, cache) = memory_cache();
    store.set("ratelimit:costs:acct-1", b"{}", 300).await.unwrap();
    cache
        .set(
            &generate_cache_key(CacheCategory::Costs, ACCOUNT, &["x"]),
            &1,
            Duration::from_secs(300),
        )
        .await;

    assert_eq!(cache.invalidate("*").await, 1);
    assert!(store.get("ratelimit:costs:acct-1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_stats_count_categories() {
    let (_, cache) = memory_cache();
    let ttl = Duration::from_secs(300);
    for i in 0..3 {
        let id = i.to_string();
        cache
            .set(
                &generate_cache_key(CacheCategory::Resources, ACCOUNT, &[id.as_str()]),
                &resource_row(i),
                ttl,
            )
            .await;
    }
    cache
        .set(&generate_cache_key(CacheCategory::Anomalies, ACCOUNT, &[]), &"spike", ttl)
        .await;

    let stats = cache.get_stats(None).await;
    assert_eq!(stats.total_keys, 4);
    assert_eq!(stats.keys_by_category.get("resources"), Some(&3));
    assert_eq!(stats.keys_by_category.get("anomalies"), Some(&1));
    let value_bytes: usize = (0..3)
        .map(|i| serde_json::to_vec(&resource_row(i)).unwrap().len())
        .sum();
    // Values only: `"spike"` is seven bytes of JSON
    assert_eq!(stats.estimated_size_bytes, value_bytes as u64 + 7);
}

#[tokio::test]
async fn test_failing_store_degrades_to_fetcher() {
    let cache = CacheService::new(Arc::new(FailingStore), CacheConfig::default());

    let fetched = cache
        .get_or_set(CacheCategory::Resources, ACCOUNT, &["list"], || async {
            Ok::<_, String>(resource_rows(2))
        })
        .await
        .unwrap();
    assert_eq!(fetched.source, CacheSource::Bypassed);
    assert_eq!(fetched.value.len(), 2);

    let key = generate_cache_key(CacheCategory::Resources, ACCOUNT, &["list"]);
    assert!(cache.get::<serde_json::Value>(&key).await.is_none());
    cache.set(&key, &1, Duration::from_secs(60)).await;
    cache.delete(&key).await;
    assert_eq!(cache.invalidate_account(ACCOUNT).await, 0);
    assert_eq!(cache.get_stats(None).await.total_keys, 0);
}

#[tokio::test]
#[ignore] // Requires Dragonfly database instance
async fn test_dragonfly_get_or_set_and_invalidate() {
    let store = DragonflyStore::new("redis://127.0.0.1:6379", Duration::from_secs(2))
        .await
        .expect("Failed to connect to Dragonfly");
    let cache = CacheService::new(Arc::new(store), CacheConfig::default());
    let account = "acct-dragonfly-cache-test";
    cache.invalidate_account(account).await;

    let fetched = cache
        .get_or_set(CacheCategory::Accounts, account, &["profile"], || async {
            Ok::<_, String>("profile".to_string())
        })
        .await
        .unwrap();
    if let Some(pending) = fetched.pending_write {
        pending.wait().await;
    }

    let key = generate_cache_key(CacheCategory::Accounts, account, &["profile"]);
    assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("profile"));
    assert_eq!(cache.invalidate_account(account).await, 1);
}
