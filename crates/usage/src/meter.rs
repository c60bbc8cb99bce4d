//! Usage meter: append-only recording and monthly aggregation (§4.5).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use saas_core::TenantId;

use crate::event::UsageEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("invalid month format, expected YYYY-MM")]
    InvalidMonth,

    #[error("storage unavailable: {0}")]
    Storage(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthSummary {
    pub messages_used: u64,
    pub tokens_used: u64,
    pub cost_estimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantMonthSummary {
    pub tenant_id: TenantId,
    pub summary: MonthSummary,
}

#[async_trait]
pub trait UsageMeter: Send + Sync {
    /// Upsert by `request_id`: a duplicate write for the same `request_id`
    /// is a no-op (first write wins).
    async fn record(&self, event: UsageEvent) -> Result<(), UsageError>;

    async fn summarize_tenant_month(&self, tenant_id: TenantId, month: &str) -> Result<MonthSummary, UsageError>;

    /// Grouped by `tenant_id`, sorted ascending.
    async fn summarize_all_tenants_month(&self, month: &str) -> Result<Vec<TenantMonthSummary>, UsageError>;
}

/// Parses a `YYYY-MM` string into the UTC month boundary
/// `[month_start, next_month_start)`. December wraps the year.
pub fn month_bounds(month: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), UsageError> {
    let parts: Vec<&str> = month.split('-').collect();
    if parts.len() != 2 {
        return Err(UsageError::InvalidMonth);
    }
    let year: i32 = parts[0].parse().map_err(|_| UsageError::InvalidMonth)?;
    let month_num: u32 = parts[1].parse().map_err(|_| UsageError::InvalidMonth)?;
    if parts[0].len() != 4 || parts[1].len() != 2 || !(1..=12).contains(&month_num) {
        return Err(UsageError::InvalidMonth);
    }

    let start_date = NaiveDate::from_ymd_opt(year, month_num, 1).ok_or(UsageError::InvalidMonth)?;
    let (next_year, next_month) = if month_num == 12 { (year + 1, 1) } else { (year, month_num + 1) };
    let end_date = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or(UsageError::InvalidMonth)?;

    let start = Utc.from_utc_datetime(&start_date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    let end = Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    Ok((start, end))
}

/// The current UTC calendar month in `YYYY-MM` form.
pub fn current_month(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn december_wraps_the_year() {
        let (start, end) = month_bounds("2025-12").unwrap();
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2025-12-01");
        assert_eq!(end.format("%Y-%m-%d").to_string(), "2026-01-01");
    }

    #[test]
    fn rejects_malformed_month() {
        assert_eq!(month_bounds("2025-13").unwrap_err(), UsageError::InvalidMonth);
        assert_eq!(month_bounds("abcd-01").unwrap_err(), UsageError::InvalidMonth);
        assert_eq!(month_bounds("2025-1").unwrap_err(), UsageError::InvalidMonth);
    }
}
