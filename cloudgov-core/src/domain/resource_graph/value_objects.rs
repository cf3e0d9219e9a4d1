//! Resource Graph value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::errors::QueryValidationError;

/// Cache category; selects the TTL applied to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Resources,
    Costs,
    Security,
    Anomalies,
    Accounts,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 5] = [
        CacheCategory::Resources,
        CacheCategory::Costs,
        CacheCategory::Security,
        CacheCategory::Anomalies,
        CacheCategory::Accounts,
    ];

    /// Key segment used for this category
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Resources => "resources",
            CacheCategory::Costs => "costs",
            CacheCategory::Security => "security",
            CacheCategory::Anomalies => "anomalies",
            CacheCategory::Accounts => "accounts",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured filters for a resource listing
///
/// Every field is untrusted and is sanitized before it reaches a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub resource_type: Option<String>,
    pub location: Option<String>,
    pub resource_group: Option<String>,
    /// Sorted so the built query (and its cache key) is deterministic
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resource_type.is_none()
            && self.location.is_none()
            && self.resource_group.is_none()
            && self.tags.is_empty()
    }
}

/// Raw pagination parameters as received from a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Validate against the configured maximum page size
    pub fn validate(self, max_limit: u32) -> Result<Pagination, QueryValidationError> {
        Pagination::new(self.page, self.limit, max_limit)
    }
}

/// Validated pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Result<Self, QueryValidationError> {
        if page == 0 {
            return Err(QueryValidationError::InvalidPage { page });
        }
        if limit == 0 || limit > max_limit {
            return Err(QueryValidationError::InvalidLimit {
                limit,
                max: max_limit,
            });
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip before this page starts
    pub fn skip(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Rows to request: one more than the page size, so a full extra row
    /// signals that another page exists
    pub fn fetch_size(&self) -> u64 {
        self.limit as u64 + 1
    }
}

/// Result format requested from the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultFormat {
    ObjectArray,
    Table,
}

/// Opaque bearer credential handed out by the credential resolver
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Response body of the remote query API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryResponse {
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(rename = "$skipToken", default, skip_serializing_if = "Option::is_none")]
    pub skip_token: Option<String>,
}

/// Rows returned by a successful query execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<serde_json::Value>,
    pub total_records: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

/// A page of items plus the metadata needed to request the next one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

/// One row of a resource count summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub location: String,
    pub count: u64,
}
