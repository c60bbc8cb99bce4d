//! External transport wrapper: an advisory message-bus notifier layered in
//! front of the durable queue (§4.1), grounded on
//! `saas_platform/adapters/queue.py`'s Storage Queue and Service Bus
//! wrappers in the original implementation. The durable store is always
//! authoritative; the notifier may disagree with it (duplicate or missing
//! signal) without correctness consequences, since nothing here trusts the
//! notifier for state — only for waking up consumers.

use async_trait::async_trait;

use saas_core::JobId;
use tracing::debug;

use crate::job::ProvisioningJob;
use crate::queue::{ProvisioningQueue, QueueError};

/// A message-bus notifier. Every method is best-effort: a failure to notify
/// must never be treated as a failure to enqueue/claim/finalize, since the
/// durable store already recorded the authoritative state.
#[async_trait]
pub trait QueueNotifier: Send + Sync {
    async fn notify_enqueued(&self, job_id: JobId);
    async fn notify_claimed(&self, job_id: JobId);
    async fn notify_done(&self, job_id: JobId);
    async fn notify_retry(&self, job_id: JobId, retry_in_seconds: i64);
    async fn notify_dead_letter(&self, job_id: JobId, error: &str);
}

/// In-memory notifier: records notifications for test assertions. Also
/// useful as the notifier for local/dev composition where no real bus is
/// wired up.
#[derive(Default)]
pub struct LoggingNotifier;

#[async_trait]
impl QueueNotifier for LoggingNotifier {
    async fn notify_enqueued(&self, job_id: JobId) {
        debug!(job_id = %job_id, "queue_notify_enqueued");
    }

    async fn notify_claimed(&self, job_id: JobId) {
        debug!(job_id = %job_id, "queue_notify_claimed");
    }

    async fn notify_done(&self, job_id: JobId) {
        debug!(job_id = %job_id, "queue_notify_done");
    }

    async fn notify_retry(&self, job_id: JobId, retry_in_seconds: i64) {
        debug!(job_id = %job_id, retry_in_seconds, "queue_notify_retry");
    }

    async fn notify_dead_letter(&self, job_id: JobId, error: &str) {
        debug!(job_id = %job_id, error, "queue_notify_dead_letter");
    }
}

/// In-memory notifier that records every notification it receives, for test
/// assertions exercising the wrapper's delegation order.
#[derive(Default)]
pub struct MemoryBusNotifier {
    pub enqueued: std::sync::Mutex<Vec<JobId>>,
    pub claimed: std::sync::Mutex<Vec<JobId>>,
    pub done: std::sync::Mutex<Vec<JobId>>,
    pub retried: std::sync::Mutex<Vec<(JobId, i64)>>,
    pub dead_lettered: std::sync::Mutex<Vec<(JobId, String)>>,
}

#[async_trait]
impl QueueNotifier for MemoryBusNotifier {
    async fn notify_enqueued(&self, job_id: JobId) {
        self.enqueued.lock().expect("notifier poisoned").push(job_id);
    }

    async fn notify_claimed(&self, job_id: JobId) {
        self.claimed.lock().expect("notifier poisoned").push(job_id);
    }

    async fn notify_done(&self, job_id: JobId) {
        self.done.lock().expect("notifier poisoned").push(job_id);
    }

    async fn notify_retry(&self, job_id: JobId, retry_in_seconds: i64) {
        self.retried.lock().expect("notifier poisoned").push((job_id, retry_in_seconds));
    }

    async fn notify_dead_letter(&self, job_id: JobId, error: &str) {
        self.dead_lettered
            .lock()
            .expect("notifier poisoned")
            .push((job_id, error.to_string()));
    }
}

/// Wraps any `ProvisioningQueue` with advisory bus notifications. Delegates
/// every state transition to the inner queue first; the notifier only runs
/// once the durable write has succeeded.
pub struct NotifyingQueue<Q, N> {
    inner: Q,
    notifier: N,
}

impl<Q, N> NotifyingQueue<Q, N> {
    pub fn new(inner: Q, notifier: N) -> Self {
        Self { inner, notifier }
    }
}

#[async_trait]
impl<Q, N> ProvisioningQueue for NotifyingQueue<Q, N>
where
    Q: ProvisioningQueue,
    N: QueueNotifier,
{
    async fn enqueue(&self, job: ProvisioningJob) -> Result<JobId, QueueError> {
        let job_id = self.inner.enqueue(job).await?;
        self.notifier.notify_enqueued(job_id).await;
        Ok(job_id)
    }

    async fn claim_next(&self) -> Result<Option<ProvisioningJob>, QueueError> {
        let claimed = self.inner.claim_next().await?;
        if let Some(job) = &claimed {
            self.notifier.notify_claimed(job.job_id).await;
        }
        Ok(claimed)
    }

    async fn mark_done(&self, job_id: JobId) -> Result<(), QueueError> {
        self.inner.mark_done(job_id).await?;
        self.notifier.notify_done(job_id).await;
        Ok(())
    }

    async fn mark_retry(&self, job_id: JobId, error: &str, retry_in_seconds: i64) -> Result<(), QueueError> {
        self.inner.mark_retry(job_id, error, retry_in_seconds).await?;
        self.notifier.notify_retry(job_id, retry_in_seconds).await;
        Ok(())
    }

    async fn mark_dead_letter(&self, job_id: JobId, error: &str) -> Result<(), QueueError> {
        self.inner.mark_dead_letter(job_id, error).await?;
        self.notifier.notify_dead_letter(job_id, error).await;
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, QueueError> {
        self.inner.get_job(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_queue::InMemoryProvisioningQueue;

    #[tokio::test]
    async fn wrapper_delegates_and_never_blocks_on_notify() {
        let queue = NotifyingQueue::new(InMemoryProvisioningQueue::new(), LoggingNotifier);
        let job = ProvisioningJob::bootstrap(saas_core::TenantId::new(), "T:bootstrap", 3);
        let job_id = queue.enqueue(job).await.unwrap();
        let claimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.job_id, job_id);
        queue.mark_done(job_id).await.unwrap();
        let after = queue.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(after.state, crate::job::JobState::Done);
    }
}
