//! Durable, at-least-once job queue contract (§4.1).

use async_trait::async_trait;
use thiserror::Error;

use saas_core::JobId;

use crate::job::ProvisioningJob;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("illegal state transition for job {0}")]
    IllegalTransition(JobId),
}

/// Idempotent, durable, single-consumer-per-job work queue with retry
/// scheduling and a dead-letter terminal (§4.1). Implementations must use
/// row-level locking with skip-locked semantics, or an equivalent atomic
/// conditional update, for `claim_next`.
#[async_trait]
pub trait ProvisioningQueue: Send + Sync {
    /// Inserts the job as `queued`. A row with the same `idempotency_key`
    /// already present makes this call a no-op: the prior job wins.
    async fn enqueue(&self, job: ProvisioningJob) -> Result<JobId, QueueError>;

    /// Atomically claims the single eligible row
    /// (`state=queued AND available_at <= now`, ordered by `available_at`
    /// then `created_at`) and transitions it to `running`.
    async fn claim_next(&self) -> Result<Option<ProvisioningJob>, QueueError>;

    /// `queued|running -> done`.
    async fn mark_done(&self, job_id: JobId) -> Result<(), QueueError>;

    /// `running -> queued`, increments `retries`, truncates `error`, and
    /// sets `available_at = now + max(retry_in_seconds, 0)`.
    async fn mark_retry(&self, job_id: JobId, error: &str, retry_in_seconds: i64) -> Result<(), QueueError>;

    /// `running -> dead_letter`, increments `retries`, truncates `error`.
    async fn mark_dead_letter(&self, job_id: JobId, error: &str) -> Result<(), QueueError>;

    async fn get_job(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, QueueError>;
}

/// Lets a shared, already-boxed queue (`Arc<dyn ProvisioningQueue>`) be
/// wrapped again, e.g. by `NotifyingQueue`, without re-exposing the
/// concrete storage type.
#[async_trait]
impl<T: ProvisioningQueue + ?Sized> ProvisioningQueue for std::sync::Arc<T> {
    async fn enqueue(&self, job: ProvisioningJob) -> Result<JobId, QueueError> {
        (**self).enqueue(job).await
    }

    async fn claim_next(&self) -> Result<Option<ProvisioningJob>, QueueError> {
        (**self).claim_next().await
    }

    async fn mark_done(&self, job_id: JobId) -> Result<(), QueueError> {
        (**self).mark_done(job_id).await
    }

    async fn mark_retry(&self, job_id: JobId, error: &str, retry_in_seconds: i64) -> Result<(), QueueError> {
        (**self).mark_retry(job_id, error, retry_in_seconds).await
    }

    async fn mark_dead_letter(&self, job_id: JobId, error: &str) -> Result<(), QueueError> {
        (**self).mark_dead_letter(job_id, error).await
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, QueueError> {
        (**self).get_job(job_id).await
    }
}
