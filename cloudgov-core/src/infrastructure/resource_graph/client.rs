//! Azure Resource Graph HTTP client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::ResourceGraphConfig;
use crate::domain::{AccessToken, RawQueryResponse, RemoteApiError, ResourceGraphClient, ResultFormat};

/// Client for the `Microsoft.ResourceGraph/resources` query endpoint
pub struct AzureResourceGraphClient {
    client: Client,
    base_url: String,
    api_version: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    subscriptions: &'a [String],
    query: &'a str,
    options: QueryRequestOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequestOptions {
    result_format: ResultFormat,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl AzureResourceGraphClient {
    pub fn new(config: &ResourceGraphConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client with custom timeout, using default client");
                Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
            self.base_url, self.api_version
        )
    }
}

/// Turn a non-success response body into a `RemoteApiError`
fn error_from_body(status: u16, text: &str) -> RemoteApiError {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(ErrorEnvelope { error }) => {
            let message = error
                .message
                .unwrap_or_else(|| format!("Request failed with status {}", status));
            let err = RemoteApiError::new(message).with_status(status);
            match error.code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        Err(_) if text.trim().is_empty() => {
            RemoteApiError::new(format!("Request failed with status {}", status)).with_status(status)
        }
        Err(_) => RemoteApiError::new(text.trim().to_string()).with_status(status),
    }
}

#[async_trait]
impl ResourceGraphClient for AzureResourceGraphClient {
    async fn execute(
        &self,
        token: &AccessToken,
        subscription_ids: &[String],
        query: &str,
        result_format: ResultFormat,
    ) -> Result<RawQueryResponse, RemoteApiError> {
        let body = QueryRequest {
            subscriptions: subscription_ids,
            query,
            options: QueryRequestOptions { result_format },
        };

        debug!(
            subscriptions = subscription_ids.len(),
            "Sending query to Azure Resource Graph"
        );

        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(token.secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }

        Ok(response.json::<RawQueryResponse>().await?)
    }
}
