//! Provisioning job model: the unit of deferred work that activates a
//! tenant after it is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use saas_core::{JobId, TenantId};

const MAX_ERROR_LEN: usize = 500;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    DeadLetter,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::DeadLetter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningJob {
    pub job_id: JobId,
    pub tenant_id: TenantId,
    /// Only `"bootstrap"` is defined by this core; the field exists so
    /// future steps do not require a schema change.
    pub step: String,
    pub idempotency_key: String,
    pub state: JobState,
    pub retries: u32,
    pub max_attempts: u32,
    pub error: Option<String>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningJob {
    pub fn bootstrap(tenant_id: TenantId, idempotency_key: impl Into<String>, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            tenant_id,
            step: "bootstrap".to_string(),
            idempotency_key: idempotency_key.into(),
            state: JobState::Queued,
            retries: 0,
            max_attempts: max_attempts.max(1),
            error: None,
            available_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Queued && self.available_at <= now
    }
}

/// Truncates an error message to the 500-character ceiling persisted jobs
/// enforce (§7).
pub fn truncate_error(error: impl Into<String>) -> String {
    let error = error.into();
    if error.chars().count() <= MAX_ERROR_LEN {
        error
    } else {
        error.chars().take(MAX_ERROR_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_truncated() {
        let long = "x".repeat(600);
        assert_eq!(truncate_error(long).len(), 500);
    }

    #[test]
    fn new_job_is_ready_immediately() {
        let job = ProvisioningJob::bootstrap(TenantId::new(), "T:bootstrap", 3);
        assert!(job.is_ready(Utc::now()));
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.retries, 0);
    }
}
