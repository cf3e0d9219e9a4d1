//! Configuration validation module

use crate::config::{
    CacheConfig, LoggingConfig, RateLimitConfig, ResourceGraphConfig, ServiceRateLimit,
    StoreConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Store configuration error: {message}")]
    Store { message: String },

    #[error("Rate limit configuration error: {message}")]
    RateLimit { message: String },

    #[error("Cache configuration error: {message}")]
    Cache { message: String },

    #[error("Resource Graph configuration error: {message}")]
    ResourceGraph { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn resource_graph(message: impl Into<String>) -> Self {
        Self::ResourceGraph {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::store(format!(
                "Store url must start with redis:// or rediss://, got: {}",
                self.url
            )));
        }

        if self.connection_timeout_seconds == 0 {
            return Err(ValidationError::store(
                "Connection timeout must be greater than 0 seconds",
            ));
        }

        if self.cleanup_interval_seconds == 0 {
            return Err(ValidationError::store(
                "Cleanup interval must be greater than 0 seconds",
            ));
        }

        Ok(())
    }
}

fn validate_service_limit(name: &str, limit: &ServiceRateLimit) -> Result<(), ValidationError> {
    if !(limit.requests_per_second.is_finite() && limit.requests_per_second > 0.0) {
        return Err(ValidationError::rate_limit(format!(
            "requests_per_second for '{}' must be a positive number, got {}",
            name, limit.requests_per_second
        )));
    }

    if limit.burst_size == 0 {
        return Err(ValidationError::rate_limit(format!(
            "burst_size for '{}' must be greater than 0",
            name
        )));
    }

    Ok(())
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.key_prefix.is_empty() {
            return Err(ValidationError::rate_limit("Key prefix cannot be empty"));
        }

        validate_service_limit("default", &self.default_limit)?;
        for (name, limit) in &self.services {
            validate_service_limit(name, limit)?;
        }

        if self.max_wait_seconds == 0 {
            return Err(ValidationError::rate_limit(
                "max_wait_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let ttls = [
            ("resources", self.ttl_seconds.resources),
            ("costs", self.ttl_seconds.costs),
            ("security", self.ttl_seconds.security),
            ("anomalies", self.ttl_seconds.anomalies),
            ("accounts", self.ttl_seconds.accounts),
        ];
        for (category, ttl) in ttls {
            if ttl == 0 {
                return Err(ValidationError::cache(format!(
                    "TTL for category '{}' must be greater than 0 seconds",
                    category
                )));
            }
        }

        if self.scan_page_size == 0 {
            return Err(ValidationError::cache(
                "scan_page_size must be greater than 0",
            ));
        }

        if self.delete_batch_size == 0 {
            return Err(ValidationError::cache(
                "delete_batch_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for ResourceGraphConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::resource_graph(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.api_version.is_empty() {
            return Err(ValidationError::resource_graph(
                "api_version cannot be empty",
            ));
        }

        if self.service_name.is_empty() {
            return Err(ValidationError::resource_graph(
                "service_name cannot be empty",
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::resource_graph(
                "Request timeout must be greater than 0 seconds",
            ));
        }

        if self.max_search_term_length == 0 {
            return Err(ValidationError::resource_graph(
                "max_search_term_length must be greater than 0",
            ));
        }

        if self.max_page_limit == 0 {
            return Err(ValidationError::resource_graph(
                "max_page_limit must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "Logging format must be 'json' or 'pretty', got: {}",
                other
            ))),
        }
    }
}
