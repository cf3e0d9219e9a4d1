//! Cloudgov Core - Resource Graph access layer
//!
//! This crate sits between application code and remote, rate-limited cloud
//! query APIs:
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with file and environment variable support
//! - [`domain`] - Query inputs, results, errors and collaborator traits
//! - [`application`] - Cached resource read paths
//! - [`infrastructure`] - Shared store, rate limiter, cache and query pipeline
//! - [`logging`] - Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! cloudgov-core/
//! ├── domain/             # Value objects, errors, collaborator traits
//! ├── application/        # ResourceGraphService
//! ├── infrastructure/
//! │   ├── store/          # Dragonfly and in-memory shared store
//! │   ├── rate_limiter/   # Distributed token bucket
//! │   ├── cache/          # Cache-aside with category TTLs
//! │   └── resource_graph/ # Sanitizers, query builder, executor, HTTP client
//! └── config/             # Configuration management
//! ```
//!
//! # Configuration
//!
//! Load configuration from files and environment:
//!
//! ```rust,ignore
//! use cloudgov_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `CLOUDGOV__` prefix with double underscore separators:
//!
//! ```bash
//! CLOUDGOV__STORE__URL=redis://dragonfly:6379
//! CLOUDGOV__CACHE__TTL_SECONDS__COSTS=1800
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use cloudgov_core::{Config, init_tracing};
//! use cloudgov_core::application::ResourceGraphService;
//! use cloudgov_core::domain::QueryFilter;
//!
//! let config = Config::load()?;
//! init_tracing(&config.logging)?;
//!
//! let service = ResourceGraphService::from_config(&config, credentials, None).await;
//! let page = service
//!     .list_resources("acct-1", &QueryFilter::new().with_location("eastus"), None)
//!     .await?;
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
