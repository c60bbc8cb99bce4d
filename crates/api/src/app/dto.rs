//! Request/response DTOs for the HTTP surface (§6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use saas_catalog::{Plan, Tenant, TenantStatus};
use saas_core::TenantId;
use saas_provisioning::JobId;
use saas_usage::{MonthSummary, TenantMonthSummary};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTenantResponse {
    pub tenant_id: TenantId,
    pub status: &'static str,
    pub provisioning_job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub tenant_id: TenantId,
    pub name: String,
    pub plan: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            tenant_id: tenant.tenant_id,
            name: tenant.name,
            plan: tenant.plan,
            status: tenant.status,
            created_at: tenant.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunNextResponse {
    pub processed: bool,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub agent_id: String,
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub tenant_id: TenantId,
    pub request_id: saas_core::RequestId,
    pub output_text: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub plan_id: String,
    pub display_name: String,
    pub monthly_messages: u64,
    pub monthly_token_cap: u64,
    pub max_agents: u32,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan_id: String,
    pub display_name: String,
    pub monthly_messages: u64,
    pub monthly_token_cap: u64,
    pub max_agents: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            plan_id: plan.plan_id,
            display_name: plan.display_name,
            monthly_messages: plan.monthly_messages,
            monthly_token_cap: plan.monthly_token_cap,
            max_agents: plan.max_agents,
            active: plan.active,
            created_at: plan.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTenantPlanRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct MonthSummaryResponse {
    pub month: String,
    pub messages_used: u64,
    pub tokens_used: u64,
    pub cost_estimate: f64,
}

impl MonthSummaryResponse {
    pub fn new(month: &str, summary: MonthSummary) -> Self {
        Self {
            month: month.to_string(),
            messages_used: summary.messages_used,
            tokens_used: summary.tokens_used,
            cost_estimate: summary.cost_estimate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TenantMonthSummaryResponse {
    pub tenant_id: TenantId,
    pub messages_used: u64,
    pub tokens_used: u64,
    pub cost_estimate: f64,
}

impl From<TenantMonthSummary> for TenantMonthSummaryResponse {
    fn from(value: TenantMonthSummary) -> Self {
        Self {
            tenant_id: value.tenant_id,
            messages_used: value.summary.messages_used,
            tokens_used: value.summary.tokens_used,
            cost_estimate: value.summary.cost_estimate,
        }
    }
}

/// Validates a `month` query parameter against `^\d{4}-\d{2}$` (§6). Returns
/// the caller-supplied value unchanged so callers can still pass it straight
/// to `month_bounds` for the richer `YYYY-MM` parse.
pub fn validate_month_param(month: &str) -> Result<(), crate::app::errors::ApiError> {
    let valid = month.len() == 7
        && month.as_bytes()[4] == b'-'
        && month[..4].bytes().all(|b| b.is_ascii_digit())
        && month[5..].bytes().all(|b| b.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(crate::app::errors::ApiError::InvalidInput(
            "month must match ^\\d{4}-\\d{2}$".to_string(),
        ))
    }
}
