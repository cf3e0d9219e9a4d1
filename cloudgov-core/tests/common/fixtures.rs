//! Test fixtures for cloudgov-core

use serde_json::{Value, json};

use cloudgov_core::config::{RateLimitConfig, ServiceRateLimit};

pub const ACCOUNT: &str = "acct-1";
pub const OTHER_ACCOUNT: &str = "acct-2";
pub const GRAPH_SERVICE: &str = "azure-resource-graph";

/// A resource row as returned with the standard projection
pub fn resource_row(index: usize) -> Value {
    json!({
        "id": format!("/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Compute/virtualMachines/vm-{:03}", index),
        "name": format!("vm-{:03}", index),
        "type": "microsoft.compute/virtualmachines",
        "location": "eastus",
        "resourceGroup": "rg-1",
        "subscriptionId": "sub-1",
        "tags": { "env": "prod" },
        "properties": {}
    })
}

pub fn resource_rows(count: usize) -> Vec<Value> {
    (0..count).map(resource_row).collect()
}

/// Default rate limits plus one extra service
pub fn rate_limit_config_with(service: &str, requests_per_second: f64, burst_size: u32) -> RateLimitConfig {
    let mut config = RateLimitConfig::default();
    config.services.insert(
        service.to_string(),
        ServiceRateLimit::new(requests_per_second, burst_size),
    );
    config
}
