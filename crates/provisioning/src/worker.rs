//! Provisioning worker: drains the queue and advances the tenant state
//! machine (§4.2), grounded on
//! `saas_platform/provisioning/worker.py` and `runner.py` in the original
//! implementation.

use std::sync::Arc;

use saas_catalog::TenantCatalog;
use saas_core::TenantId;
use tracing::{info, warn};

use crate::job::truncate_error;
use crate::queue::ProvisioningQueue;

const TENANT_NOT_FOUND: &str = "tenant not found";

/// Processes exactly one job from the queue. Returns `true` if a job was
/// claimed and processed (regardless of outcome), `false` if the queue was
/// empty.
pub async fn process_next_job(
    queue: &dyn ProvisioningQueue,
    tenants: &dyn TenantCatalog,
    default_max_attempts: u32,
    retry_base_seconds: i64,
) -> Result<bool, anyhow::Error> {
    let Some(job) = queue.claim_next().await? else {
        return Ok(false);
    };

    let attempt_budget = job.max_attempts.max(default_max_attempts).max(1);

    match activate_tenant(tenants, job.tenant_id).await {
        Ok(TenantActivation::NotFound) => {
            warn!(tenant_id = %job.tenant_id, job_id = %job.job_id, "provisioning_job_dead_letter: tenant not found");
            queue.mark_dead_letter(job.job_id, TENANT_NOT_FOUND).await?;
            Ok(false)
        }
        Ok(TenantActivation::Activated) | Ok(TenantActivation::AlreadyActive) => {
            queue.mark_done(job.job_id).await?;
            info!(tenant_id = %job.tenant_id, job_id = %job.job_id, "provisioning_job_completed");
            Ok(true)
        }
        Err(err) => {
            let message = err.to_string();
            if job.retries + 1 >= attempt_budget {
                warn!(tenant_id = %job.tenant_id, job_id = %job.job_id, error = %message, "provisioning_job_dead_letter");
                queue.mark_dead_letter(job.job_id, &truncate_error(message)).await?;
            } else {
                let delay = retry_base_seconds.max(0) * 2i64.pow(job.retries);
                warn!(tenant_id = %job.tenant_id, job_id = %job.job_id, error = %message, delay, "provisioning_job_retry");
                queue.mark_retry(job.job_id, &truncate_error(message), delay).await?;
            }
            Ok(false)
        }
    }
}

enum TenantActivation {
    NotFound,
    Activated,
    AlreadyActive,
}

async fn activate_tenant(tenants: &dyn TenantCatalog, tenant_id: TenantId) -> Result<TenantActivation, anyhow::Error> {
    match tenants.get(tenant_id).await? {
        None => Ok(TenantActivation::NotFound),
        Some(tenant) => {
            if tenant.status == saas_catalog::TenantStatus::Active {
                Ok(TenantActivation::AlreadyActive)
            } else {
                tenants.activate(tenant_id).await?;
                Ok(TenantActivation::Activated)
            }
        }
    }
}

/// One-shot mode: process a single job and return whether it processed one.
pub async fn run_once(
    queue: &dyn ProvisioningQueue,
    tenants: &dyn TenantCatalog,
    default_max_attempts: u32,
    retry_base_seconds: i64,
) -> Result<bool, anyhow::Error> {
    process_next_job(queue, tenants, default_max_attempts, retry_base_seconds).await
}

/// Continuous mode: loop forever, sleeping `poll_seconds` whenever the queue
/// is empty. Intended to run on its own task, independent of the HTTP
/// server.
pub async fn run_forever(
    queue: Arc<dyn ProvisioningQueue>,
    tenants: Arc<dyn TenantCatalog>,
    default_max_attempts: u32,
    retry_base_seconds: i64,
    poll_seconds: u64,
) -> ! {
    loop {
        match process_next_job(queue.as_ref(), tenants.as_ref(), default_max_attempts, retry_base_seconds).await {
            Ok(true) => continue,
            Ok(false) => tokio::time::sleep(std::time::Duration::from_secs(poll_seconds.max(1))).await,
            Err(err) => {
                warn!(error = %err, "provisioning_worker_tick_failed");
                tokio::time::sleep(std::time::Duration::from_secs(poll_seconds.max(1))).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saas_catalog::{InMemoryTenantCatalog, Tenant};
    use saas_core::TenantId;
    use crate::job::ProvisioningJob;
    use crate::memory_queue::InMemoryProvisioningQueue;

    #[tokio::test]
    async fn dead_letters_missing_tenant_without_consuming_retry_budget() {
        let queue = InMemoryProvisioningQueue::new();
        let tenants = InMemoryTenantCatalog::new();
        let tenant_id = TenantId::new();
        let job = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 3);
        let job_id = job.job_id;
        queue.enqueue(job).await.unwrap();

        let processed = process_next_job(&queue, &tenants, 3, 5).await.unwrap();
        assert!(!processed);

        let after = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after.state, crate::job::JobState::DeadLetter);
        assert_eq!(after.retries, 1);
        assert_eq!(after.error.as_deref(), Some("tenant not found"));
    }

    #[tokio::test]
    async fn activates_tenant_and_marks_job_done() {
        let queue = InMemoryProvisioningQueue::new();
        let tenants = InMemoryTenantCatalog::new();
        let tenant_id = TenantId::new();
        tenants.create(Tenant::new(tenant_id, "Acme", "starter")).await.unwrap();
        let job = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 3);
        let job_id = job.job_id;
        queue.enqueue(job).await.unwrap();

        let processed = process_next_job(&queue, &tenants, 3, 5).await.unwrap();
        assert!(processed);

        let tenant = tenants.get(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.status, saas_catalog::TenantStatus::Active);
        let after = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after.state, crate::job::JobState::Done);
    }

    #[tokio::test]
    async fn reprocessing_an_activated_tenant_is_a_no_op() {
        let queue = InMemoryProvisioningQueue::new();
        let tenants = InMemoryTenantCatalog::new();
        let tenant_id = TenantId::new();
        tenants.create(Tenant::new(tenant_id, "Acme", "starter")).await.unwrap();
        tenants.activate(tenant_id).await.unwrap();
        let job = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 3);
        queue.enqueue(job).await.unwrap();

        let processed = process_next_job(&queue, &tenants, 3, 5).await.unwrap();
        assert!(processed);
        let tenant = tenants.get(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.status, saas_catalog::TenantStatus::Active);
    }

    /// Fails the first `failures_remaining` calls to `get`, then delegates.
    struct FlakyTenantCatalog {
        inner: InMemoryTenantCatalog,
        failures_remaining: std::sync::atomic::AtomicU32,
    }

    #[async_trait::async_trait]
    impl TenantCatalog for FlakyTenantCatalog {
        async fn create(&self, tenant: saas_catalog::Tenant) -> Result<(), saas_catalog::CatalogError> {
            self.inner.create(tenant).await
        }

        async fn get(&self, tenant_id: TenantId) -> Result<Option<saas_catalog::Tenant>, saas_catalog::CatalogError> {
            if self.failures_remaining.fetch_update(std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst, |n| {
                if n > 0 { Some(n - 1) } else { None }
            }).is_ok() {
                return Err(saas_catalog::CatalogError::Storage("transient read failure".to_string()));
            }
            self.inner.get(tenant_id).await
        }

        async fn activate(&self, tenant_id: TenantId) -> Result<(), saas_catalog::CatalogError> {
            self.inner.activate(tenant_id).await
        }

        async fn set_plan(&self, tenant_id: TenantId, plan: String) -> Result<(), saas_catalog::CatalogError> {
            self.inner.set_plan(tenant_id, plan).await
        }
    }

    #[tokio::test]
    async fn backoff_then_dead_letter_on_repeated_transient_failure() {
        let queue = InMemoryProvisioningQueue::new();
        let tenant_id = TenantId::new();
        let inner = InMemoryTenantCatalog::new();
        inner.create(Tenant::new(tenant_id, "Acme", "starter")).await.unwrap();
        let tenants = FlakyTenantCatalog {
            inner,
            failures_remaining: std::sync::atomic::AtomicU32::new(2),
        };

        let job = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 2);
        let job_id = job.job_id;
        queue.enqueue(job).await.unwrap();

        process_next_job(&queue, &tenants, 2, 0).await.unwrap();
        let after_first = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after_first.state, crate::job::JobState::Queued);
        assert_eq!(after_first.retries, 1);

        process_next_job(&queue, &tenants, 2, 0).await.unwrap();
        let after_second = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after_second.state, crate::job::JobState::DeadLetter);
        assert_eq!(after_second.retries, 2);
    }
}
