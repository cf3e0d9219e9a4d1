//! Hand-written fakes for the access layer's collaborators

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use cloudgov_core::domain::{
    AccessToken, CredentialResolver, RawQueryResponse, RemoteApiError, ResourceGraphClient,
    ResultFormat,
};
use cloudgov_core::infrastructure::store::{ScanPage, SharedStore, StoreError};

/// One call received by `RecordingClient`
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub token: String,
    pub subscription_ids: Vec<String>,
    pub query: String,
    pub result_format: ResultFormat,
}

/// Remote API fake that records every query and replays a fixed outcome
pub struct RecordingClient {
    outcome: Result<RawQueryResponse, RemoteApiError>,
    /// Captured queries for verification
    pub calls: Arc<Mutex<Vec<RecordedQuery>>>,
}

impl RecordingClient {
    pub fn returning(rows: Vec<serde_json::Value>) -> Self {
        let response = RawQueryResponse {
            total_records: rows.len() as u64,
            count: rows.len() as u64,
            data: rows,
            skip_token: None,
        };
        Self {
            outcome: Ok(response),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: RemoteApiError) -> Self {
        Self {
            outcome: Err(error),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn last_call(&self) -> Option<RecordedQuery> {
        self.calls.lock().await.last().cloned()
    }
}

#[async_trait]
impl ResourceGraphClient for RecordingClient {
    async fn execute(
        &self,
        token: &AccessToken,
        subscription_ids: &[String],
        query: &str,
        result_format: ResultFormat,
    ) -> Result<RawQueryResponse, RemoteApiError> {
        self.calls.lock().await.push(RecordedQuery {
            token: token.secret().to_string(),
            subscription_ids: subscription_ids.to_vec(),
            query: query.to_string(),
            result_format,
        });
        self.outcome.clone()
    }
}

/// Credential resolver handing out the same token and subscription for every account
pub struct StaticCredentials {
    token: String,
    subscription_id: String,
    error: Option<RemoteApiError>,
}

impl StaticCredentials {
    pub fn new(token: &str, subscription_id: &str) -> Self {
        Self {
            token: token.to_string(),
            subscription_id: subscription_id.to_string(),
            error: None,
        }
    }

    pub fn failing(error: RemoteApiError) -> Self {
        Self {
            token: String::new(),
            subscription_id: String::new(),
            error: Some(error),
        }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn get_token(&self, _account_id: &str) -> Result<AccessToken, RemoteApiError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(AccessToken::new(self.token.clone())),
        }
    }

    async fn get_subscription_id(&self, _account_id: &str) -> Result<String, RemoteApiError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.subscription_id.clone()),
        }
    }
}

/// Store whose every operation fails, as if Dragonfly went away mid-flight
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Connection("store unavailable".to_string())
}

#[async_trait]
impl SharedStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(unavailable())
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl_secs: u64) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn delete_many(&self, _keys: &[String]) -> Result<u64, StoreError> {
        Err(unavailable())
    }

    async fn scan(
        &self,
        _cursor: u64,
        _pattern: &str,
        _count: usize,
    ) -> Result<ScanPage, StoreError> {
        Err(unavailable())
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _new_value: &[u8],
        _ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }
}
