//! `POST /v1/tenants`, `GET /v1/tenants/{id}` (§6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use saas_catalog::Tenant;
use saas_core::TenantId;
use saas_provisioning::ProvisioningJob;

use crate::app::dto::{CreateTenantRequest, CreateTenantResponse, TenantResponse};
use crate::app::errors::ApiError;
use crate::app::state::AppState;

/// `201 {tenant_id, status: "pending", provisioning_job_id}`. The plan must
/// already exist and be active; anything else is `400` (§6).
pub async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("name must not be empty".to_string()));
    }

    let plan = state
        .plans
        .get(&body.plan)
        .await?
        .ok_or_else(|| ApiError::InvalidInput(format!("plan '{}' does not exist", body.plan)))?;
    if !plan.active {
        return Err(ApiError::InvalidInput(format!("plan '{}' is not active", body.plan)));
    }

    let tenant_id = TenantId::new();
    let tenant = Tenant::new(tenant_id, body.name, body.plan);
    state.tenants.create(tenant).await?;

    let idempotency_key = format!("{tenant_id}:bootstrap");
    let job = ProvisioningJob::bootstrap(tenant_id, idempotency_key, state.settings.provisioning_job_max_attempts);
    let provisioning_job_id = state.queue.enqueue(job).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTenantResponse {
            tenant_id,
            status: "pending",
            provisioning_job_id,
        }),
    ))
}

pub async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
) -> Result<Json<TenantResponse>, ApiError> {
    let tenant = state.tenants.get(tenant_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(tenant.into()))
}
