//! Test helper functions for cloudgov-core

use std::sync::Arc;
use std::time::Duration;

use cloudgov_core::application::ResourceGraphService;
use cloudgov_core::config::{CacheConfig, RateLimitConfig, ResourceGraphConfig};
use cloudgov_core::domain::{CredentialResolver, ResourceGraphClient};
use cloudgov_core::infrastructure::cache::CacheService;
use cloudgov_core::infrastructure::rate_limiter::RateLimiterService;
use cloudgov_core::infrastructure::resource_graph::QueryExecutor;
use cloudgov_core::infrastructure::store::SharedStore;

/// Assemble a service over the given store and fakes
pub fn build_service(
    store: Arc<dyn SharedStore>,
    client: Arc<dyn ResourceGraphClient>,
    credentials: Arc<dyn CredentialResolver>,
    rate_limit: RateLimitConfig,
) -> (ResourceGraphService, Arc<RateLimiterService>) {
    let resource_graph = ResourceGraphConfig::default();
    let rate_limiter = Arc::new(RateLimiterService::new(Arc::clone(&store), rate_limit));
    let cache = Arc::new(CacheService::new(store, CacheConfig::default()));
    let executor = Arc::new(QueryExecutor::new(
        Arc::clone(&rate_limiter),
        credentials,
        client,
        resource_graph.service_name.clone(),
    ));

    (
        ResourceGraphService::new(executor, cache, resource_graph),
        rate_limiter,
    )
}

/// Poll until `account_id` has `expected` cached keys, for detached cache writes
pub async fn wait_for_cached_keys(cache: &CacheService, account_id: &str, expected: u64) {
    for _ in 0..100 {
        if cache.get_stats(Some(account_id)).await.total_keys == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "cache for {} never reached {} keys",
        account_id, expected
    );
}
