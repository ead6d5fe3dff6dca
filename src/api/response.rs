//! Response envelope shared by all façade endpoints.

use axum::Json;
use serde::Serialize;

/// Standard response envelope: `{code, message, data, timestamp}`.
/// `code` is 0 on success and the HTTP status on error.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    pub message: String,
    pub data: T,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: 0,
            message: "ok".to_string(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// Paginated payload: `{items, pagination}`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}
