//! Business rules per resource, each service holding a handle to the record store.

pub mod access_service;
pub mod account_service;
pub mod appointment_service;
pub mod billing_service;
pub mod document_service;
pub mod finance_service;
pub mod odontogram_service;
pub mod patient_service;
pub mod report_service;
pub mod search_service;
pub mod subscription_service;
pub mod tenant_service;
pub mod upload_service;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::store::Query;

pub use access_service::{AccessGate, PatientResource};
pub use tenant_service::{Tenant, TenantError, TenantService};

/// Query-string parameters shared by the list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date: Option<String>,
    pub patient_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

impl ListParams {
    pub fn paging(&self, default_limit: i64) -> Paging {
        Paging::parse(self.page.as_deref(), self.limit.as_deref(), default_limit)
    }
}

/// Largest page size a list endpoint hands out
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// 1-based page and page size; unparseable or non-positive values fall back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub limit: i64,
}

impl Paging {
    pub fn parse(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> Self {
        let page = page.and_then(|p| p.trim().parse::<i64>().ok()).filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn apply(&self, query: Query) -> Query {
        query.page(self.page, self.limit)
    }
}

/// `YYYY-MM-DD`
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

/// Inclusive start day, exclusive end (end day + 24h); unparseable bounds are ignored
pub fn date_range(mut query: Query, column: &str, start: Option<&str>, end: Option<&str>) -> Query {
    if let Some(start) = start.and_then(parse_day) {
        query = query.gte(column, day_start(start));
    }
    if let Some(end) = end.and_then(parse_day) {
        query = query.lt(column, day_start(end) + Duration::hours(24));
    }
    query
}

/// Trimmed, non-empty value of an optional parameter
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
