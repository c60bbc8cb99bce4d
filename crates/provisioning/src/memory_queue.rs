//! In-memory `ProvisioningQueue`: used by tests and the dev composition root.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use saas_core::JobId;

use crate::job::{truncate_error, JobState, ProvisioningJob};
use crate::queue::{ProvisioningQueue, QueueError};

#[derive(Default)]
pub struct InMemoryProvisioningQueue {
    jobs: Mutex<HashMap<JobId, ProvisioningJob>>,
}

impl InMemoryProvisioningQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProvisioningQueue for InMemoryProvisioningQueue {
    async fn enqueue(&self, job: ProvisioningJob) -> Result<JobId, QueueError> {
        let mut jobs = self.jobs.lock().expect("provisioning queue poisoned");
        if let Some(existing) = jobs.values().find(|j| j.idempotency_key == job.idempotency_key) {
            return Ok(existing.job_id);
        }
        let job_id = job.job_id;
        jobs.insert(job_id, job);
        Ok(job_id)
    }

    async fn claim_next(&self) -> Result<Option<ProvisioningJob>, QueueError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().expect("provisioning queue poisoned");
        let claimed_id = jobs
            .values()
            .filter(|j| j.is_ready(now))
            .min_by(|a, b| a.available_at.cmp(&b.available_at).then(a.created_at.cmp(&b.created_at)))
            .map(|j| j.job_id);

        match claimed_id {
            Some(job_id) => {
                let job = jobs.get_mut(&job_id).expect("job vanished under lock");
                job.state = JobState::Running;
                job.updated_at = now;
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_done(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().expect("provisioning queue poisoned");
        let job = jobs.get_mut(&job_id).ok_or(QueueError::NotFound(job_id))?;
        job.state = JobState::Done;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_retry(&self, job_id: JobId, error: &str, retry_in_seconds: i64) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().expect("provisioning queue poisoned");
        let job = jobs.get_mut(&job_id).ok_or(QueueError::NotFound(job_id))?;
        let now = Utc::now();
        job.state = JobState::Queued;
        job.retries += 1;
        job.error = Some(truncate_error(error));
        job.available_at = now + Duration::seconds(retry_in_seconds.max(0));
        job.updated_at = now;
        Ok(())
    }

    async fn mark_dead_letter(&self, job_id: JobId, error: &str) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().expect("provisioning queue poisoned");
        let job = jobs.get_mut(&job_id).ok_or(QueueError::NotFound(job_id))?;
        job.state = JobState::DeadLetter;
        job.retries += 1;
        job.error = Some(truncate_error(error));
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, QueueError> {
        Ok(self.jobs.lock().expect("provisioning queue poisoned").get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_is_idempotent_by_key() {
        let queue = InMemoryProvisioningQueue::new();
        let tenant_id = saas_core::TenantId::new();
        let j1 = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 3);
        let j2 = ProvisioningJob::bootstrap(tenant_id, "T:bootstrap", 3);
        let id1 = queue.enqueue(j1).await.unwrap();
        let id2 = queue.enqueue(j2).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn claim_next_is_exclusive() {
        let queue = InMemoryProvisioningQueue::new();
        let job = ProvisioningJob::bootstrap(saas_core::TenantId::new(), "T:bootstrap", 3);
        queue.enqueue(job).await.unwrap();
        let first = queue.claim_next().await.unwrap();
        assert!(first.is_some());
        let second = queue.claim_next().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn dead_letter_then_retry_increments_retries() {
        let queue = InMemoryProvisioningQueue::new();
        let job = ProvisioningJob::bootstrap(saas_core::TenantId::new(), "T:bootstrap", 3);
        let job_id = queue.enqueue(job).await.unwrap();
        queue.claim_next().await.unwrap();
        queue.mark_retry(job_id, "boom", 0).await.unwrap();
        let after = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after.retries, 1);
        assert_eq!(after.state, JobState::Queued);
    }
}
