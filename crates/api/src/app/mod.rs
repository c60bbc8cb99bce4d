//! HTTP API application wiring (Axum router + state).
//!
//! - `state.rs`: the composed collaborator graph (`AppState`)
//! - `admission.rs`: the 9-stage admission pipeline (§4.3)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: the HTTP error taxonomy

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

pub mod admission;
pub mod dto;
pub mod errors;
pub mod routes;
pub mod state;

use state::AppState;

/// Builds the full HTTP router over a shared `AppState`.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/v1/tenants", post(routes::tenants::create_tenant))
        .route("/v1/tenants/:id", get(routes::tenants::get_tenant))
        .route("/v1/tenants/:id/runs", post(routes::runs::run))
        .route("/v1/provisioning/jobs/run-next", post(routes::provisioning::run_next))
        .route("/v1/admin/plans", get(routes::admin::list_plans).post(routes::admin::create_plan))
        .route("/v1/admin/plans/:id", get(routes::admin::get_plan))
        .route("/v1/admin/tenants/:id/plan", patch(routes::admin::set_tenant_plan))
        .route("/v1/admin/tenants/:id/usage", get(routes::admin::tenant_usage))
        .route("/v1/admin/usage/export", get(routes::admin::usage_export))
        .with_state(state)
}
