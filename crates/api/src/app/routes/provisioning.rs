//! `POST /v1/provisioning/jobs/run-next` (§6): a manual worker tick, mainly
//! useful for tests and operator-triggered draining; the same logic also
//! runs continuously on its own task via `saas_provisioning::run_forever`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::app::dto::RunNextResponse;
use crate::app::errors::ApiError;
use crate::app::state::AppState;

pub async fn run_next(State(state): State<Arc<AppState>>) -> Result<Json<RunNextResponse>, ApiError> {
    let processed = saas_provisioning::run_once(
        state.queue.as_ref(),
        state.tenants.as_ref(),
        state.settings.provisioning_job_max_attempts,
        state.settings.provisioning_retry_base_seconds,
    )
    .await
    .map_err(|err| ApiError::DependencyUnavailable(err.to_string()))?;

    Ok(Json(RunNextResponse { processed }))
}
