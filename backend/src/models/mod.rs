//! Data models shared across database access and API handlers.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Page/limit query parameters accepted by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// 1-based page number (default: 1).
    pub page: Option<i64>,
    /// Page size (default: 20, max: 100).
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self { page, limit }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn limit_or(&self, default: i64) -> i64 {
        match self.limit {
            Some(limit) if limit >= 1 => limit.min(MAX_PAGE_LIMIT),
            _ => default,
        }
    }

    pub fn offset_for(&self, limit: i64) -> i64 {
        (self.page() - 1) * limit
    }
}

/// Pagination block returned next to list payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Sort direction accepted by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Unknown values fall back to descending order.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Picks `raw` when it is in `allowed`, otherwise `default`.
pub fn whitelist_sort(
    raw: Option<&str>,
    allowed: &[&'static str],
    default: &'static str,
) -> &'static str {
    raw.and_then(|value| {
        let value = value.trim();
        allowed.iter().copied().find(|candidate| *candidate == value)
    })
    .unwrap_or(default)
}

pub mod action_item;
pub mod activity;
pub mod attachment;
pub mod audit_log;
pub mod incident;
pub mod notification;
pub mod post_mortem;
pub mod report;
pub mod stats;
pub mod tag;
pub mod template;
pub mod user;
