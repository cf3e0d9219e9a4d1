//! Resource Graph application service
//!
//! The read paths controllers call. Each one validates its input, builds the
//! query, and runs it through the cache with the executor as the fetcher.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::{Config, ResourceGraphConfig};
use crate::domain::{
    CacheCategory, CredentialResolver, PageRequest, PaginatedResponse, Pagination, QueryFilter,
    QueryResult, ResourceGraphClient, ResourceGraphError, ResourceSummary,
};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::rate_limiter::RateLimiterService;
use crate::infrastructure::resource_graph::{
    AzureResourceGraphClient, QueryExecutor, build_query, build_search_query, build_summary_query,
    format_response,
};
use crate::infrastructure::store;

/// Cached, rate-limited access to resource inventory
pub struct ResourceGraphService {
    executor: Arc<QueryExecutor>,
    cache: Arc<CacheService>,
    config: ResourceGraphConfig,
}

impl ResourceGraphService {
    pub fn new(
        executor: Arc<QueryExecutor>,
        cache: Arc<CacheService>,
        config: ResourceGraphConfig,
    ) -> Self {
        Self {
            executor,
            cache,
            config,
        }
    }

    /// Wire the full stack from configuration
    ///
    /// Connects the shared store (falling back to memory) and uses the
    /// Azure HTTP client unless `client` is given.
    pub async fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialResolver>,
        client: Option<Arc<dyn ResourceGraphClient>>,
    ) -> Self {
        let store = store::connect(&config.store).await;

        let rate_limiter = Arc::new(RateLimiterService::new(
            Arc::clone(&store),
            config.rate_limit.clone(),
        ));
        let cache = Arc::new(CacheService::new(store, config.cache.clone()));
        let client = client.unwrap_or_else(|| {
            Arc::new(AzureResourceGraphClient::new(&config.resource_graph))
                as Arc<dyn ResourceGraphClient>
        });

        let executor = Arc::new(QueryExecutor::new(
            rate_limiter,
            credentials,
            client,
            config.resource_graph.service_name.clone(),
        ));

        Self::new(executor, cache, config.resource_graph.clone())
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    fn pagination(&self, page: Option<PageRequest>) -> Result<Option<Pagination>, ResourceGraphError> {
        Ok(page
            .map(|page| page.validate(self.config.max_page_limit))
            .transpose()?)
    }

    async fn cached_query(
        &self,
        account_id: &str,
        operation: &str,
        query: &str,
    ) -> Result<QueryResult, ResourceGraphError> {
        let fingerprint = query_fingerprint(query);
        let fetched = self
            .cache
            .get_or_set(
                CacheCategory::Resources,
                account_id,
                &[operation, &fingerprint],
                || self.executor.execute_query(account_id, query),
            )
            .await?;

        debug!(
            account_id = %account_id,
            operation = %operation,
            source = ?fetched.source,
            "Resource query served"
        );
        Ok(fetched.into_value())
    }

    /// List resources matching `filter`
    #[instrument(skip(self, filter, page))]
    pub async fn list_resources(
        &self,
        account_id: &str,
        filter: &QueryFilter,
        page: Option<PageRequest>,
    ) -> Result<PaginatedResponse<Value>, ResourceGraphError> {
        let pagination = self.pagination(page)?;
        let query = build_query(filter, pagination.as_ref())?;

        let result = self.cached_query(account_id, "list", &query).await?;
        Ok(format_response(result.rows, pagination.as_ref()))
    }

    /// Find resources whose name contains `term`
    #[instrument(skip(self, term, page))]
    pub async fn search_resources(
        &self,
        account_id: &str,
        term: &str,
        page: Option<PageRequest>,
    ) -> Result<PaginatedResponse<Value>, ResourceGraphError> {
        let pagination = self.pagination(page)?;
        let query = build_search_query(
            term,
            self.config.max_search_term_length,
            pagination.as_ref(),
        )?;

        let result = self.cached_query(account_id, "search", &query).await?;
        Ok(format_response(result.rows, pagination.as_ref()))
    }

    /// Resource counts by type and location
    #[instrument(skip(self))]
    pub async fn summarize_resources(
        &self,
        account_id: &str,
    ) -> Result<Vec<ResourceSummary>, ResourceGraphError> {
        let query = build_summary_query();
        let result = self.cached_query(account_id, "summary", &query).await?;

        let summaries = result
            .rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<ResourceSummary>(row) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Skipping malformed summary row: {}", e);
                    None
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Drop every cached resource query for the account
    pub async fn invalidate_account_resources(&self, account_id: &str) -> u64 {
        self.cache
            .invalidate_category(CacheCategory::Resources, Some(account_id))
            .await
    }
}

/// Stable identifier of a query's text, used as a cache key component
pub fn query_fingerprint(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}
