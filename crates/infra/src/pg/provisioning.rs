use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use saas_core::{JobId, TenantId};
use saas_provisioning::{truncate_error, JobState, ProvisioningJob, ProvisioningQueue, QueueError};

/// `provisioning_jobs(job_id pk, tenant_id, step, idempotency_key unique,
/// state, retries, max_attempts, error, available_at, created_at,
/// updated_at)` (§6). `claim_next` uses `FOR UPDATE SKIP LOCKED` so that
/// concurrent workers never block on, or double-claim, the same row,
/// grounded on `seesaw-job-postgres`'s `claim_ready`.
#[derive(Clone)]
pub struct PgProvisioningQueue {
    pool: PgPool,
}

impl PgProvisioningQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProvisioningQueue for PgProvisioningQueue {
    async fn enqueue(&self, job: ProvisioningJob) -> Result<JobId, QueueError> {
        let existing = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT job_id FROM provisioning_jobs WHERE idempotency_key = $1",
        )
        .bind(&job.idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        if let Some(job_id) = existing {
            return Ok(JobId::from_uuid(job_id));
        }

        sqlx::query(
            "INSERT INTO provisioning_jobs
                (job_id, tenant_id, step, idempotency_key, state, retries, max_attempts,
                 error, available_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (idempotency_key) DO NOTHING",
        )
        .bind(job.job_id.as_uuid())
        .bind(job.tenant_id.as_uuid())
        .bind(&job.step)
        .bind(&job.idempotency_key)
        .bind(state_str(job.state))
        .bind(job.retries as i32)
        .bind(job.max_attempts as i32)
        .bind(&job.error)
        .bind(job.available_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        // Someone else may have inserted between the check and the insert;
        // the idempotency key is the source of truth either way.
        let job_id = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT job_id FROM provisioning_jobs WHERE idempotency_key = $1",
        )
        .bind(&job.idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(JobId::from_uuid(job_id))
    }

    async fn claim_next(&self) -> Result<Option<ProvisioningJob>, QueueError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, tenant_id, step, idempotency_key, state, retries, max_attempts,
                    error, available_at, created_at, updated_at
             FROM provisioning_jobs
             WHERE state = 'queued' AND available_at <= now()
             ORDER BY available_at ASC, created_at ASC
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            tx.commit().await.map_err(storage_err)?;
            return Ok(None);
        };

        let now = Utc::now();
        sqlx::query("UPDATE provisioning_jobs SET state = 'running', updated_at = $2 WHERE job_id = $1")
            .bind(row.job_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        let mut job = row.into_job();
        job.state = JobState::Running;
        job.updated_at = now;
        Ok(Some(job))
    }

    async fn mark_done(&self, job_id: JobId) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE provisioning_jobs SET state = 'done', updated_at = $2 WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id));
        }
        Ok(())
    }

    async fn mark_retry(&self, job_id: JobId, error: &str, retry_in_seconds: i64) -> Result<(), QueueError> {
        let delay = retry_in_seconds.max(0);
        let result = sqlx::query(
            "UPDATE provisioning_jobs
             SET state = 'queued',
                 retries = retries + 1,
                 error = $2,
                 available_at = now() + ($3 || ' seconds')::interval,
                 updated_at = now()
             WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(truncate_error(error))
        .bind(delay.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id));
        }
        Ok(())
    }

    async fn mark_dead_letter(&self, job_id: JobId, error: &str) -> Result<(), QueueError> {
        let result = sqlx::query(
            "UPDATE provisioning_jobs
             SET state = 'dead_letter', retries = retries + 1, error = $2, updated_at = now()
             WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .bind(truncate_error(error))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id));
        }
        Ok(())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<ProvisioningJob>, QueueError> {
        sqlx::query_as::<_, JobRow>(
            "SELECT job_id, tenant_id, step, idempotency_key, state, retries, max_attempts,
                    error, available_at, created_at, updated_at
             FROM provisioning_jobs WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .map(|row| row.into_job())
        .map(Some)
        .or(Ok(None))
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    job_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    step: String,
    idempotency_key: String,
    state: String,
    retries: i32,
    max_attempts: i32,
    error: Option<String>,
    available_at: chrono::DateTime<chrono::Utc>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobRow {
    fn into_job(self) -> ProvisioningJob {
        ProvisioningJob {
            job_id: JobId::from_uuid(self.job_id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            step: self.step,
            idempotency_key: self.idempotency_key,
            state: parse_state(&self.state),
            retries: self.retries as u32,
            max_attempts: self.max_attempts as u32,
            error: self.error,
            available_at: self.available_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn state_str(state: JobState) -> &'static str {
    match state {
        JobState::Queued => "queued",
        JobState::Running => "running",
        JobState::Done => "done",
        JobState::DeadLetter => "dead_letter",
    }
}

fn parse_state(raw: &str) -> JobState {
    match raw {
        "running" => JobState::Running,
        "done" => JobState::Done,
        "dead_letter" => JobState::DeadLetter,
        _ => JobState::Queued,
    }
}

fn storage_err(err: sqlx::Error) -> QueueError {
    QueueError::Storage(err.to_string())
}
