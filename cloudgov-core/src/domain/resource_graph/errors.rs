//! Resource Graph domain errors

use thiserror::Error;

/// Untrusted input rejected before a query is built
///
/// Always fatal to the calling operation and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryValidationError {
    #[error("Invalid resource type format: expected 'provider/type', got '{value}'")]
    InvalidResourceType { value: String },

    #[error("Search term cannot be empty")]
    EmptySearchTerm,

    #[error("Search term is too long: {length} characters (max {max})")]
    SearchTermTooLong { length: usize, max: usize },

    #[error("Page must be at least 1, got {page}")]
    InvalidPage { page: u32 },

    #[error("Limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: u32, max: u32 },
}

/// Error reported by the remote query API or the credential resolver
///
/// `code` and `status_code` are diagnostic only; every remote failure is
/// handled the same way by the executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteApiError {
    pub code: Option<String>,
    pub status_code: Option<u16>,
    pub message: String,
}

impl RemoteApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

impl From<reqwest::Error> for RemoteApiError {
    fn from(e: reqwest::Error) -> Self {
        let code = if e.is_timeout() {
            Some("Timeout".to_string())
        } else if e.is_connect() {
            Some("ConnectionFailed".to_string())
        } else if e.is_decode() {
            Some("InvalidResponse".to_string())
        } else {
            None
        };

        Self {
            code,
            status_code: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Errors surfaced to callers of the access layer
///
/// Infrastructure failures (cache or rate limit store unreachable) never
/// appear here: they are absorbed where they happen.
#[derive(Error, Debug)]
pub enum ResourceGraphError {
    #[error("Validation error: {0}")]
    Validation(#[from] QueryValidationError),

    #[error(
        "Rate limit exceeded for {service} (account {account_id}). Try again in {retry_after_seconds} seconds."
    )]
    RateLimitExceeded {
        service: String,
        account_id: String,
        retry_after_seconds: u64,
    },

    #[error("Resource Graph query failed: {message}")]
    RemoteQuery {
        message: String,
        #[source]
        source: Option<RemoteApiError>,
    },
}

impl ResourceGraphError {
    /// Seconds the caller should wait before retrying, if this is a rate-limit denial
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = ResourceGraphError::RateLimitExceeded {
            service: "azure-resource-graph".to_string(),
            account_id: "acct-1".to_string(),
            retry_after_seconds: 3,
        };
        assert_eq!(err.retry_after(), Some(3));

        let err = ResourceGraphError::from(QueryValidationError::EmptySearchTerm);
        assert_eq!(err.retry_after(), None);
        assert!(err.is_validation());
    }

    #[test]
    fn test_remote_error_display_is_message() {
        let err = RemoteApiError::new("boom").with_code("BadRequest").with_status(400);
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.status_code, Some(400));
    }
}
