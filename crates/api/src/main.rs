use std::sync::Arc;

use saas_api::app::state::AppState;
use saas_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    saas_observability::init();

    let settings = Settings::from_env().expect("invalid configuration");
    let poll_seconds = settings.provisioning_worker_poll_seconds;
    let max_attempts = settings.provisioning_job_max_attempts;
    let retry_base_seconds = settings.provisioning_retry_base_seconds;

    let state = AppState::build(settings).await?;

    let queue = Arc::clone(&state.queue);
    let tenants = Arc::clone(&state.tenants);
    tokio::spawn(saas_provisioning::run_forever(
        queue,
        tenants,
        max_attempts,
        retry_base_seconds,
        poll_seconds,
    ));

    let app = saas_api::app::build_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await?;
    Ok(())
}
