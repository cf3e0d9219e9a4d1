//! Resource Graph query pipeline
//!
//! - Sanitizers for untrusted filter input
//! - Deterministic KQL query construction
//! - Rate-limited, credential-resolving execution with error scrubbing
//! - Response pagination
//! - HTTP client for the Azure endpoint

pub mod client;
pub mod executor;
pub mod query_builder;
pub mod response;
pub mod sanitize;

pub use client::AzureResourceGraphClient;
pub use executor::QueryExecutor;
pub use query_builder::{build_query, build_search_query, build_summary_query};
pub use response::format_response;
pub use sanitize::{sanitize_resource_type, sanitize_string, validate_search_term};
