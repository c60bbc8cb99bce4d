//! The 9-stage admission pipeline (§4.3): decides whether a run request may
//! execute and, if so, drives the gateway call and usage recording. Kept as
//! one straight-line function rather than a tower layer, since each stage's
//! failure needs a distinct `ApiError` variant and several stages need the
//! prior stage's output (tenant, plan) rather than just a pass/fail.

use std::str::FromStr;

use chrono::Utc;
use tracing::instrument;

use saas_core::{RequestId, TenantId};
use saas_infra::gateway::AgentRunRequest;
use saas_usage::quota::{allow_request, QuotaCounter, QuotaPolicy};
use saas_usage::{current_month, estimate_tokens, UsageEvent};

use crate::app::dto::{RunRequest, RunResponse};
use crate::app::errors::ApiError;
use crate::app::state::AppState;

pub struct RunHeaders {
    pub tenant_id_header: Option<String>,
    pub customer_user_id_header: Option<String>,
    pub api_key_header: Option<String>,
    pub authorization_header: Option<String>,
}

#[instrument(skip(state, headers, body), fields(tenant_id = %path_tenant_id))]
pub async fn run(
    state: &AppState,
    path_tenant_id: TenantId,
    headers: RunHeaders,
    body: RunRequest,
) -> Result<RunResponse, ApiError> {
    // Stage 1: header presence.
    let header_tenant_raw = headers
        .tenant_id_header
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("X-Tenant-Id header is required".to_string()))?;
    let customer_user_id = headers
        .customer_user_id_header
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("X-Customer-User-Id header is required".to_string()))?;

    let header_tenant_id = TenantId::from_str(header_tenant_raw)
        .map_err(|_| ApiError::InvalidInput("X-Tenant-Id is not a valid tenant id".to_string()))?;

    // Stage 2: path/header agreement.
    if header_tenant_id != path_tenant_id {
        return Err(ApiError::Forbidden);
    }

    // Stage 3: authentication.
    let api_key_header = headers.api_key_header.as_deref().filter(|s| !s.is_empty());
    let authorization_header = headers.authorization_header.as_deref();
    let _authenticated = state
        .tenant_auth
        .authenticate(path_tenant_id, api_key_header, authorization_header, customer_user_id)
        .await
        .map_err(map_tenant_auth_error)?;

    // Stage 4: tenant load.
    let tenant = state
        .tenants
        .get(path_tenant_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if tenant.status != saas_catalog::TenantStatus::Active {
        return Err(ApiError::Conflict("tenant is not active".to_string()));
    }

    // Stage 5: plan load.
    let plan = state.plans.get(&tenant.plan).await?.ok_or_else(|| {
        ApiError::Conflict(format!("plan '{}' does not exist", tenant.plan))
    })?;
    if !plan.active {
        return Err(ApiError::Conflict(format!("plan '{}' is not active", tenant.plan)));
    }

    // Stage 6: rate limit.
    let rate_limit_key = format!("{}:{}", path_tenant_id, body.agent_id);
    if !state.rate_limiter.allow(&rate_limit_key).await? {
        return Err(ApiError::RateLimited("rate limit"));
    }

    // Stage 7: quota.
    let month = current_month(Utc::now());
    let summary = state.usage.summarize_tenant_month(path_tenant_id, &month).await?;
    let estimated_tokens = estimate_tokens(&body.message) * 2;
    let policy = QuotaPolicy {
        included_messages: plan.monthly_messages,
        hard_token_cap: plan.monthly_token_cap,
    };
    let counter = QuotaCounter {
        messages_used: summary.messages_used,
        tokens_used: summary.tokens_used,
    };
    if !allow_request(policy, counter, estimated_tokens) {
        return Err(ApiError::RateLimited("quota"));
    }

    // Stage 8: execute.
    let started = std::time::Instant::now();
    let gateway_response = state
        .gateway
        .execute(AgentRunRequest {
            tenant_id: path_tenant_id,
            agent_id: body.agent_id.clone(),
            model: "provider-default".to_string(),
            input: body.message.clone(),
        })
        .await
        .map_err(|err| ApiError::DependencyUnavailable(err.to_string()))?;
    let latency_ms = started.elapsed().as_millis() as u64;

    // Stage 9: record.
    let request_id = RequestId::new();
    let tokens_in = estimate_tokens(&body.message);
    let tokens_out = estimate_tokens(&gateway_response.output);
    state
        .usage
        .record(UsageEvent {
            request_id,
            tenant_id: path_tenant_id,
            agent_id: body.agent_id,
            model: "provider-default".to_string(),
            latency_ms,
            tokens_in,
            tokens_out,
            cost_estimate: 0.0,
            created_at: Utc::now(),
        })
        .await?;

    Ok(RunResponse {
        tenant_id: path_tenant_id,
        request_id,
        output_text: gateway_response.output,
    })
}

fn map_tenant_auth_error(err: saas_auth::TenantAuthError) -> ApiError {
    match err {
        saas_auth::TenantAuthError::Unauthenticated => ApiError::Unauthenticated,
        saas_auth::TenantAuthError::SubjectMismatch => ApiError::Unauthenticated,
        saas_auth::TenantAuthError::Misconfigured => {
            ApiError::Misconfigured("no tenant authentication mechanism is configured".to_string())
        }
    }
}
