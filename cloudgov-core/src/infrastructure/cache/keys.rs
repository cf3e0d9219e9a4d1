//! Cache key layout
//!
//! Every key has the shape `cloudgov:{category}:{account}:{id1}:{id2}...`.
//! The account id and identifiers are percent-encoded, so caller input can
//! never introduce a separator or a glob metacharacter, and two distinct
//! accounts never share a key.

use crate::domain::CacheCategory;

/// Prefix shared by every cache key
pub const CACHE_NAMESPACE: &str = "cloudgov";

/// Percent-encode every byte outside `[A-Za-z0-9_.~-]`
///
/// The mapping is reversible, so distinct inputs yield distinct components.
pub fn encode_key_component(component: &str) -> String {
    urlencoding::encode(component).into_owned()
}

/// Key prefix owned by one account within a category
pub fn account_key(category: CacheCategory, account_id: &str) -> String {
    format!(
        "{}:{}:{}",
        CACHE_NAMESPACE,
        category.as_str(),
        encode_key_component(account_id)
    )
}

/// Generate a cache key for `(category, account, identifiers)`
pub fn generate_cache_key(
    category: CacheCategory,
    account_id: &str,
    identifiers: &[&str],
) -> String {
    let mut key = account_key(category, account_id);
    for identifier in identifiers {
        key.push(':');
        key.push_str(&encode_key_component(identifier));
    }
    key
}

/// Prefix `pattern` with the namespace unless it already carries it
pub fn namespaced_pattern(pattern: &str) -> String {
    let namespace_prefix = format!("{}:", CACHE_NAMESPACE);
    if pattern.starts_with(&namespace_prefix) {
        pattern.to_string()
    } else {
        format!("{}{}", namespace_prefix, pattern)
    }
}

/// Category segment of a namespaced key
pub fn category_of(key: &str) -> Option<&str> {
    let mut segments = key.split(':');
    match (segments.next(), segments.next()) {
        (Some(CACHE_NAMESPACE), Some(category)) => Some(category),
        _ => None,
    }
}

/// Account segment of a namespaced key
pub fn account_of(key: &str) -> Option<&str> {
    let mut segments = key.split(':');
    match segments.next() {
        Some(CACHE_NAMESPACE) => segments.nth(1),
        _ => None,
    }
}
