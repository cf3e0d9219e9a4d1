//! Resource Graph read paths

pub mod service;

pub use service::{ResourceGraphService, query_fingerprint};
