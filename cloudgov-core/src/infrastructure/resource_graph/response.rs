//! Shaping raw rows into paginated responses

use crate::domain::{PaginatedResponse, Pagination, PaginationInfo};

/// Trim the look-ahead row and report whether another page exists
///
/// Without pagination every row is returned as a single page.
pub fn format_response<T>(mut rows: Vec<T>, pagination: Option<&Pagination>) -> PaginatedResponse<T> {
    match pagination {
        Some(pagination) => {
            let limit = pagination.limit() as usize;
            let has_more = rows.len() > limit;
            rows.truncate(limit);

            PaginatedResponse {
                items: rows,
                pagination: PaginationInfo {
                    page: pagination.page(),
                    limit: pagination.limit(),
                    has_more,
                },
            }
        }
        None => {
            let limit = u32::try_from(rows.len()).unwrap_or(u32::MAX);
            PaginatedResponse {
                items: rows,
                pagination: PaginationInfo {
                    page: 1,
                    limit,
                    has_more: false,
                },
            }
        }
    }
}
