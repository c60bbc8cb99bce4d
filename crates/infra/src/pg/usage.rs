use async_trait::async_trait;
use sqlx::PgPool;

use saas_core::TenantId;
use saas_usage::{month_bounds, MonthSummary, TenantMonthSummary, UsageError, UsageEvent, UsageMeter};

/// `usage_events(request_id pk, tenant_id, agent_id, model, latency_ms,
/// tokens_in, tokens_out, cost_estimate, created_at)` (§6). `record` is
/// idempotent by `request_id`, grounded on the `ON CONFLICT DO NOTHING`
/// insert spec §4.5 names directly.
#[derive(Clone)]
pub struct PgUsageMeter {
    pool: PgPool,
}

impl PgUsageMeter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageMeter for PgUsageMeter {
    async fn record(&self, event: UsageEvent) -> Result<(), UsageError> {
        sqlx::query(
            "INSERT INTO usage_events
                (request_id, tenant_id, agent_id, model, latency_ms, tokens_in, tokens_out,
                 cost_estimate, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (request_id) DO NOTHING",
        )
        .bind(event.request_id.as_uuid())
        .bind(event.tenant_id.as_uuid())
        .bind(&event.agent_id)
        .bind(&event.model)
        .bind(event.latency_ms as i64)
        .bind(event.tokens_in as i64)
        .bind(event.tokens_out as i64)
        .bind(event.cost_estimate)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(storage_err)
    }

    async fn summarize_tenant_month(&self, tenant_id: TenantId, month: &str) -> Result<MonthSummary, UsageError> {
        let (start, end) = month_bounds(month)?;

        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT COUNT(*) AS messages_used,
                    COALESCE(SUM(tokens_in + tokens_out), 0) AS tokens_used,
                    COALESCE(SUM(cost_estimate), 0) AS cost_estimate
             FROM usage_events
             WHERE tenant_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(tenant_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.into_summary())
    }

    async fn summarize_all_tenants_month(&self, month: &str) -> Result<Vec<TenantMonthSummary>, UsageError> {
        let (start, end) = month_bounds(month)?;

        let rows = sqlx::query_as::<_, TenantSummaryRow>(
            "SELECT tenant_id,
                    COUNT(*) AS messages_used,
                    COALESCE(SUM(tokens_in + tokens_out), 0) AS tokens_used,
                    COALESCE(SUM(cost_estimate), 0) AS cost_estimate
             FROM usage_events
             WHERE created_at >= $1 AND created_at < $2
             GROUP BY tenant_id
             ORDER BY tenant_id ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(TenantSummaryRow::into_tenant_summary).collect())
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    messages_used: i64,
    tokens_used: i64,
    cost_estimate: f64,
}

impl SummaryRow {
    fn into_summary(self) -> MonthSummary {
        MonthSummary {
            messages_used: self.messages_used as u64,
            tokens_used: self.tokens_used as u64,
            cost_estimate: self.cost_estimate,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TenantSummaryRow {
    tenant_id: uuid::Uuid,
    messages_used: i64,
    tokens_used: i64,
    cost_estimate: f64,
}

impl TenantSummaryRow {
    fn into_tenant_summary(self) -> TenantMonthSummary {
        TenantMonthSummary {
            tenant_id: TenantId::from_uuid(self.tenant_id),
            summary: MonthSummary {
                messages_used: self.messages_used as u64,
                tokens_used: self.tokens_used as u64,
                cost_estimate: self.cost_estimate,
            },
        }
    }
}

fn storage_err(err: sqlx::Error) -> UsageError {
    UsageError::Storage(err.to_string())
}
