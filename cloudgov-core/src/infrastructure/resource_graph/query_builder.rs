//! KQL query construction
//!
//! Queries are assembled from fixed clauses plus sanitized literals. Clause
//! order is deterministic, so identical inputs always produce the same text
//! (and therefore the same cache key).

use super::sanitize::{sanitize_resource_type, sanitize_string, validate_search_term};
use crate::domain::{Pagination, QueryFilter, QueryValidationError};

/// Table every query starts from
pub const BASE_TABLE: &str = "Resources";

/// Columns returned for resource listings
const PROJECTION: &str =
    "| project id, name, type, location, resourceGroup, subscriptionId, tags, properties";

const ORDERING: &str = "| order by name asc";

const SUMMARY: &str = "| summarize count = count() by type, location | order by count desc";

fn finish(mut clauses: Vec<String>, pagination: Option<&Pagination>) -> String {
    clauses.push(PROJECTION.to_string());
    clauses.push(ORDERING.to_string());

    if let Some(pagination) = pagination {
        clauses.push(format!("| skip {}", pagination.skip()));
        clauses.push(format!("| take {}", pagination.fetch_size()));
    }

    clauses.join(" ")
}

/// Build a resource listing query from structured filters
///
/// The resource type must be `provider/type`; every other value is escaped.
pub fn build_query(
    filter: &QueryFilter,
    pagination: Option<&Pagination>,
) -> Result<String, QueryValidationError> {
    let mut clauses = vec![BASE_TABLE.to_string()];

    if let Some(resource_type) = &filter.resource_type {
        clauses.push(format!(
            "| where type =~ '{}'",
            sanitize_resource_type(resource_type)?
        ));
    }

    if let Some(location) = &filter.location {
        clauses.push(format!("| where location =~ '{}'", sanitize_string(location)));
    }

    if let Some(resource_group) = &filter.resource_group {
        clauses.push(format!(
            "| where resourceGroup =~ '{}'",
            sanitize_string(resource_group)
        ));
    }

    for (key, value) in &filter.tags {
        clauses.push(format!(
            "| where tags['{}'] == '{}'",
            sanitize_string(key),
            sanitize_string(value)
        ));
    }

    Ok(finish(clauses, pagination))
}

/// Build a name search query
pub fn build_search_query(
    term: &str,
    max_term_length: usize,
    pagination: Option<&Pagination>,
) -> Result<String, QueryValidationError> {
    let term = validate_search_term(term, max_term_length)?;
    let clauses = vec![
        BASE_TABLE.to_string(),
        format!("| where name contains '{}'", sanitize_string(&term)),
    ];
    Ok(finish(clauses, pagination))
}

/// Resource counts grouped by type and location
pub fn build_summary_query() -> String {
    format!("{} {}", BASE_TABLE, SUMMARY)
}
