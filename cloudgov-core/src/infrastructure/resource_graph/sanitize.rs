//! Input sanitizers for query construction
//!
//! The remote API takes a query string and offers no parameter binding, so
//! every untrusted value is either validated against an allow-list or escaped
//! before it is placed inside a single-quoted literal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::QueryValidationError;

static RE_RESOURCE_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+/[A-Za-z0-9._-]+$").expect("resource type pattern is valid")
});

/// Escape a value for use inside a single-quoted string literal
///
/// Backslashes are escaped before quotes, so an input backslash can never
/// pair up with the escape added for a following quote. CR, LF and tab each
/// become a space and the result is trimmed.
pub fn sanitize_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\r' | '\n' | '\t' => out.push(' '),
            other => out.push(other),
        }
    }
    out.trim().to_string()
}

/// Validate a `provider/type` identifier and lower-case it
pub fn sanitize_resource_type(input: &str) -> Result<String, QueryValidationError> {
    if RE_RESOURCE_TYPE.is_match(input) {
        Ok(input.to_lowercase())
    } else {
        Err(QueryValidationError::InvalidResourceType {
            value: input.to_string(),
        })
    }
}

/// Trim a free-text search term and bound its length (in characters)
pub fn validate_search_term(term: &str, max_length: usize) -> Result<String, QueryValidationError> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(QueryValidationError::EmptySearchTerm);
    }

    let length = trimmed.chars().count();
    if length > max_length {
        return Err(QueryValidationError::SearchTermTooLong {
            length,
            max: max_length,
        });
    }

    Ok(trimmed.to_string())
}
