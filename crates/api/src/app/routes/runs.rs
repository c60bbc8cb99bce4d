//! `POST /v1/tenants/{id}/runs` (§6): the admission-pipeline entrypoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use saas_core::TenantId;

use crate::app::admission::{self, RunHeaders};
use crate::app::dto::{RunRequest, RunResponse};
use crate::app::errors::ApiError;
use crate::app::state::AppState;

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_string)
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<TenantId>,
    headers: HeaderMap,
    Json(body): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let run_headers = RunHeaders {
        tenant_id_header: header_string(&headers, "x-tenant-id"),
        customer_user_id_header: header_string(&headers, "x-customer-user-id"),
        api_key_header: header_string(&headers, "x-api-key"),
        authorization_header: header_string(&headers, "authorization"),
    };

    let response = admission::run(&state, tenant_id, run_headers, body).await?;
    Ok(Json(response))
}
