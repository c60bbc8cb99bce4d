//! Admin RBAC-gated endpoints (§6): plan catalog CRUD, moving a tenant to a
//! new plan, and per-tenant/all-tenants monthly usage. Every handler
//! authenticates via `AdminAuthService` and then applies `authorize_admin`
//! with the `platform-admin` role as the required credential, since the
//! spec leaves concrete role/scope names to the deployment.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use saas_auth::{authorize_admin, AdminAuthzError};
use saas_catalog::Plan;
use saas_core::TenantId;
use saas_usage::current_month;

use crate::app::dto::{
    validate_month_param, CreatePlanRequest, MonthSummaryResponse, PlanResponse, SetTenantPlanRequest,
    TenantMonthSummaryResponse, TenantResponse,
};
use crate::app::errors::ApiError;
use crate::app::state::AppState;

const ADMIN_ROLE: &str = "platform-admin";

async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
    tenant_id: Option<TenantId>,
) -> Result<saas_auth::AdminPrincipal, ApiError> {
    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok());
    let principal = state.admin_auth.authenticate(authorization).await.map_err(map_admin_error)?;
    authorize_admin(&principal, &[ADMIN_ROLE], &[], tenant_id).map_err(map_admin_error)?;
    Ok(principal)
}

fn map_admin_error(err: AdminAuthzError) -> ApiError {
    match err {
        AdminAuthzError::MissingToken | AdminAuthzError::InvalidToken(_) => ApiError::Unauthenticated,
        AdminAuthzError::MissingRoleOrScope | AdminAuthzError::TenantNotInScope => ApiError::Forbidden,
    }
}

pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PlanResponse>>, ApiError> {
    require_admin(&state, &headers, None).await?;
    let plans = state.plans.list().await?;
    Ok(Json(plans.into_iter().map(PlanResponse::from).collect()))
}

pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanResponse>, ApiError> {
    require_admin(&state, &headers, None).await?;
    let plan = state.plans.get(&plan_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(plan.into()))
}

pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanResponse>), ApiError> {
    require_admin(&state, &headers, None).await?;
    if body.plan_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("plan_id must not be empty".to_string()));
    }
    let plan = Plan::new(
        body.plan_id,
        body.display_name,
        body.monthly_messages,
        body.monthly_token_cap,
        body.max_agents,
    );
    state.plans.put(plan.clone()).await?;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

pub async fn set_tenant_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<TenantId>,
    Json(body): Json<SetTenantPlanRequest>,
) -> Result<Json<TenantResponse>, ApiError> {
    require_admin(&state, &headers, Some(tenant_id)).await?;

    let plan = state
        .plans
        .get(&body.plan)
        .await?
        .ok_or_else(|| ApiError::InvalidInput(format!("plan '{}' does not exist", body.plan)))?;
    if !plan.active {
        return Err(ApiError::InvalidInput(format!("plan '{}' is not active", body.plan)));
    }

    state.tenants.set_plan(tenant_id, body.plan).await?;
    let tenant = state.tenants.get(tenant_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(tenant.into()))
}

#[derive(serde::Deserialize)]
pub struct MonthQuery {
    month: Option<String>,
}

pub async fn tenant_usage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tenant_id): Path<TenantId>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthSummaryResponse>, ApiError> {
    require_admin(&state, &headers, Some(tenant_id)).await?;
    state.tenants.get(tenant_id).await?.ok_or(ApiError::NotFound)?;

    let month = query.month.unwrap_or_else(|| current_month(chrono::Utc::now()));
    validate_month_param(&month)?;
    let summary = state.usage.summarize_tenant_month(tenant_id, &month).await?;
    Ok(Json(MonthSummaryResponse::new(&month, summary)))
}

pub async fn usage_export(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<TenantMonthSummaryResponse>>, ApiError> {
    require_admin(&state, &headers, None).await?;

    let month = query.month.unwrap_or_else(|| current_month(chrono::Utc::now()));
    validate_month_param(&month)?;
    let summaries = state.usage.summarize_all_tenants_month(&month).await?;
    Ok(Json(summaries.into_iter().map(TenantMonthSummaryResponse::from).collect()))
}
