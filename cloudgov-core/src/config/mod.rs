//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::CacheCategory;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub resource_graph: ResourceGraphConfig,
    pub logging: LoggingConfig,
}

/// Backend for the shared store
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Dragonfly/Redis, shared by every process instance (recommended for production)
    #[default]
    Dragonfly,
    /// Process-local map (development/single instance)
    Memory,
}

/// Shared store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Dragonfly DB connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Connection timeout in seconds
    pub connection_timeout_seconds: u64,
    /// Purge interval for expired entries of the in-memory backend, in seconds
    pub cleanup_interval_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Dragonfly,
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_seconds: 5,
            cleanup_interval_seconds: 300,
        }
    }
}

/// Token bucket parameters for one upstream service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceRateLimit {
    /// Sustained refill rate
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst_size: u32,
}

impl ServiceRateLimit {
    pub const fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

impl Default for ServiceRateLimit {
    fn default() -> Self {
        Self::new(5.0, 10)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Prefix for bucket keys in the shared store
    pub key_prefix: String,
    /// Applied to services missing from `services`
    pub default_limit: ServiceRateLimit,
    /// Per-service limits keyed by service name
    pub services: HashMap<String, ServiceRateLimit>,
    /// Compare-and-swap attempts per token consumption before giving up
    pub max_consume_retries: u32,
    /// Upper bound for `wait_for_rate_limit` when the caller does not pass one
    pub max_wait_seconds: u64,
}

impl RateLimitConfig {
    /// Limits for `service`, or the conservative default
    pub fn limit_for(&self, service: &str) -> ServiceRateLimit {
        self.services
            .get(service)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let services = HashMap::from([
            (
                "azure-resource-graph".to_string(),
                ServiceRateLimit::new(15.0, 20),
            ),
            (
                "azure-cost-management".to_string(),
                ServiceRateLimit::new(4.0, 8),
            ),
            (
                "aws-cost-explorer".to_string(),
                ServiceRateLimit::new(5.0, 10),
            ),
            (
                "aws-security-hub".to_string(),
                ServiceRateLimit::new(10.0, 20),
            ),
        ]);

        Self {
            enabled: true,
            key_prefix: "ratelimit".to_string(),
            default_limit: ServiceRateLimit::default(),
            services,
            max_consume_retries: 5,
            max_wait_seconds: 30,
        }
    }
}

/// TTL per cache category, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    pub resources: u64,
    pub costs: u64,
    pub security: u64,
    pub anomalies: u64,
    pub accounts: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            resources: 900,   // 15 minutes
            costs: 3600,      // 1 hour
            security: 300,    // 5 minutes
            anomalies: 1800,  // 30 minutes
            accounts: 600,    // 10 minutes
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every read goes straight to the fetcher
    pub enabled: bool,
    pub ttl_seconds: CacheTtlConfig,
    /// COUNT hint for each SCAN page during invalidation and stats
    pub scan_page_size: usize,
    /// Keys per DEL call during invalidation
    pub delete_batch_size: usize,
}

impl CacheConfig {
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        let secs = match category {
            CacheCategory::Resources => self.ttl_seconds.resources,
            CacheCategory::Costs => self.ttl_seconds.costs,
            CacheCategory::Security => self.ttl_seconds.security,
            CacheCategory::Anomalies => self.ttl_seconds.anomalies,
            CacheCategory::Accounts => self.ttl_seconds.accounts,
        };
        Duration::from_secs(secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: CacheTtlConfig::default(),
            scan_page_size: 100,
            delete_batch_size: 100,
        }
    }
}

/// Remote Resource Graph API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceGraphConfig {
    pub base_url: String,
    pub api_version: String,
    /// Rate limiter service name used for every query
    pub service_name: String,
    pub request_timeout_seconds: u64,
    pub max_search_term_length: usize,
    pub max_page_limit: u32,
}

impl Default for ResourceGraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://management.azure.com".to_string(),
            api_version: "2021-03-01".to_string(),
            service_name: "azure-resource-graph".to_string(),
            request_timeout_seconds: 30,
            max_search_term_length: 100,
            max_page_limit: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::Validate::validate(&self.store)?;
        validation::Validate::validate(&self.rate_limit)?;
        validation::Validate::validate(&self.cache)?;
        validation::Validate::validate(&self.resource_graph)?;
        validation::Validate::validate(&self.logging)?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        // Add local config and environment variables last (highest priority)
        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CLOUDGOV").separator("__"));

        let mut config: Config = builder.build()?.try_deserialize()?;

        // REDIS_URL is the common convention for the store location
        if let Ok(store_url) = std::env::var("REDIS_URL") {
            config.store.url = store_url;
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
