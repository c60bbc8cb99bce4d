//! In-memory `UsageMeter`: used by tests and the dev composition root.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use saas_core::{RequestId, TenantId};

use crate::event::UsageEvent;
use crate::meter::{month_bounds, MonthSummary, TenantMonthSummary, UsageError, UsageMeter};

#[derive(Default)]
pub struct InMemoryUsageMeter {
    events: Mutex<HashMap<RequestId, UsageEvent>>,
}

impl InMemoryUsageMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageMeter for InMemoryUsageMeter {
    async fn record(&self, event: UsageEvent) -> Result<(), UsageError> {
        let mut events = self.events.lock().expect("usage meter poisoned");
        events.entry(event.request_id).or_insert(event);
        Ok(())
    }

    async fn summarize_tenant_month(&self, tenant_id: TenantId, month: &str) -> Result<MonthSummary, UsageError> {
        let (start, end) = month_bounds(month)?;
        let events = self.events.lock().expect("usage meter poisoned");
        let mut summary = MonthSummary::default();
        for event in events.values() {
            if event.tenant_id == tenant_id && event.created_at >= start && event.created_at < end {
                summary.messages_used += 1;
                summary.tokens_used += event.tokens_in + event.tokens_out;
                summary.cost_estimate += event.cost_estimate;
            }
        }
        Ok(summary)
    }

    async fn summarize_all_tenants_month(&self, month: &str) -> Result<Vec<TenantMonthSummary>, UsageError> {
        let (start, end) = month_bounds(month)?;
        let events = self.events.lock().expect("usage meter poisoned");
        let mut by_tenant: HashMap<TenantId, MonthSummary> = HashMap::new();
        for event in events.values() {
            if event.created_at >= start && event.created_at < end {
                let summary = by_tenant.entry(event.tenant_id).or_default();
                summary.messages_used += 1;
                summary.tokens_used += event.tokens_in + event.tokens_out;
                summary.cost_estimate += event.cost_estimate;
            }
        }
        let mut out: Vec<TenantMonthSummary> = by_tenant
            .into_iter()
            .map(|(tenant_id, summary)| TenantMonthSummary { tenant_id, summary })
            .collect();
        out.sort_by(|a, b| a.tenant_id.to_string().cmp(&b.tenant_id.to_string()));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(tenant_id: TenantId, request_id: RequestId, created_at: chrono::DateTime<Utc>) -> UsageEvent {
        UsageEvent {
            request_id,
            tenant_id,
            agent_id: "agent-1".to_string(),
            model: "provider-default".to_string(),
            latency_ms: 10,
            tokens_in: 3,
            tokens_out: 4,
            cost_estimate: 0.0,
            created_at,
        }
    }

    #[tokio::test]
    async fn duplicate_request_id_is_idempotent() {
        let meter = InMemoryUsageMeter::new();
        let tenant_id = TenantId::new();
        let request_id = RequestId::new();
        let when = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        meter.record(event(tenant_id, request_id, when)).await.unwrap();
        meter.record(event(tenant_id, request_id, when)).await.unwrap();

        let summary = meter.summarize_tenant_month(tenant_id, "2026-03").await.unwrap();
        assert_eq!(summary.messages_used, 1);
        assert_eq!(summary.tokens_used, 7);
    }

    #[tokio::test]
    async fn zero_result_month_is_all_zeros() {
        let meter = InMemoryUsageMeter::new();
        let summary = meter.summarize_tenant_month(TenantId::new(), "2026-01").await.unwrap();
        assert_eq!(summary, MonthSummary::default());
    }

    #[tokio::test]
    async fn all_tenants_summary_is_sorted_by_tenant_id() {
        let meter = InMemoryUsageMeter::new();
        let when = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 1).unwrap();
        let t1 = TenantId::new();
        let t2 = TenantId::new();
        meter.record(event(t1, RequestId::new(), when)).await.unwrap();
        meter.record(event(t2, RequestId::new(), when)).await.unwrap();

        let all = meter.summarize_all_tenants_month("2026-03").await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].tenant_id.to_string() <= all[1].tenant_id.to_string());
    }
}
