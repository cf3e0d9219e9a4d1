//! Collaborator interfaces consumed by the access layer

use async_trait::async_trait;

use super::errors::RemoteApiError;
use super::value_objects::{AccessToken, RawQueryResponse, ResultFormat};

/// Remote, rate-limited query API
#[async_trait]
pub trait ResourceGraphClient: Send + Sync {
    /// Run `query` against the given subscriptions
    async fn execute(
        &self,
        token: &AccessToken,
        subscription_ids: &[String],
        query: &str,
        result_format: ResultFormat,
    ) -> Result<RawQueryResponse, RemoteApiError>;
}

/// Resolves per-account credentials
///
/// Credential storage and decryption live behind this trait and are owned
/// elsewhere.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn get_token(&self, account_id: &str) -> Result<AccessToken, RemoteApiError>;

    async fn get_subscription_id(&self, account_id: &str) -> Result<String, RemoteApiError>;
}
