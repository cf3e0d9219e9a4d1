//! Guarded query execution
//!
//! Every remote call goes through the same sequence: rate limit check,
//! credential resolution, the call itself, then token consumption. Remote
//! failures are logged with a bounded preview and surfaced with a scrubbed
//! message.

use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::domain::{
    CredentialResolver, QueryResult, RemoteApiError, ResourceGraphClient, ResourceGraphError,
    ResultFormat,
};
use crate::infrastructure::rate_limiter::RateLimiterService;

/// Characters of query text that may appear in logs
const QUERY_PREVIEW_CHARS: usize = 50;

/// Message substituted for upstream errors that talk about credentials
const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// Executes queries against the remote API on behalf of an account
pub struct QueryExecutor {
    rate_limiter: Arc<RateLimiterService>,
    credentials: Arc<dyn CredentialResolver>,
    client: Arc<dyn ResourceGraphClient>,
    service_name: String,
}

impl QueryExecutor {
    pub fn new(
        rate_limiter: Arc<RateLimiterService>,
        credentials: Arc<dyn CredentialResolver>,
        client: Arc<dyn ResourceGraphClient>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            rate_limiter,
            credentials,
            client,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run `query` for `account_id`
    ///
    /// A rate limit denial returns before anything remote is contacted; a
    /// token is only consumed after the call succeeded.
    #[instrument(skip(self, query), fields(service = %self.service_name))]
    pub async fn execute_query(
        &self,
        account_id: &str,
        query: &str,
    ) -> Result<QueryResult, ResourceGraphError> {
        let check = self
            .rate_limiter
            .check_rate_limit(&self.service_name, account_id)
            .await;
        if !check.allowed {
            return Err(ResourceGraphError::RateLimitExceeded {
                service: self.service_name.clone(),
                account_id: account_id.to_string(),
                retry_after_seconds: check.retry_after.unwrap_or(1),
            });
        }

        match self.call_remote(account_id, query).await {
            Ok(result) => {
                self.rate_limiter
                    .consume_token(&self.service_name, account_id)
                    .await;
                debug!(
                    rows = result.rows.len(),
                    total_records = result.total_records,
                    "Resource Graph query succeeded"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    account_id = %account_id,
                    query_preview = %query_preview(query),
                    code = e.code.as_deref().unwrap_or("unknown"),
                    status_code = e.status_code,
                    "Resource Graph query failed: {}",
                    e.message
                );
                Err(ResourceGraphError::RemoteQuery {
                    message: scrub_message(&e.message),
                    source: Some(e),
                })
            }
        }
    }

    async fn call_remote(&self, account_id: &str, query: &str) -> Result<QueryResult, RemoteApiError> {
        let token = self.credentials.get_token(account_id).await?;
        let subscription_id = self.credentials.get_subscription_id(account_id).await?;

        let response = self
            .client
            .execute(&token, &[subscription_id], query, ResultFormat::ObjectArray)
            .await?;

        Ok(QueryResult {
            total_records: response.total_records.max(response.data.len() as u64),
            rows: response.data,
        })
    }
}

/// First characters of a query, safe to log
pub fn query_preview(query: &str) -> String {
    let mut chars = query.chars();
    let preview: String = chars.by_ref().take(QUERY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Hide provider diagnostics that describe credential problems
pub fn scrub_message(message: &str) -> String {
    if message.to_lowercase().contains("credential") {
        AUTHENTICATION_FAILED.to_string()
    } else {
        message.to_string()
    }
}
