//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// Page size clamped to 1..=200
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.clamp(1, 200))
    }

    /// Number of rows to skip for the requested page
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        Self {
            total,
            page: pagination.page.max(1),
            limit: limit as u32,
            pages: (total + limit - 1) / limit,
        }
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(total, pagination),
        }
    }
}

/// Optional date range for list queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
