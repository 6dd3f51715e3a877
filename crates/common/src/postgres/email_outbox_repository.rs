use crate::domain::{
    DomainError, DomainResult, EmailJob, EmailOutboxRepository, EmailPayload, FailureOutcome,
    JobStatus, NewEmailJob, OutboxJob,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_postgres::Row;
use tracing::{debug, instrument, warn};

/// Email outbox row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct EmailQueueRow {
    pub id: i64,
    pub to_email: String,
    pub subject: String,
    pub html: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<&Row> for EmailQueueRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            to_email: row.get("to_email"),
            subject: row.get("subject"),
            html: row.get("html"),
            status: row.get("status"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
            processed_at: row.get("processed_at"),
            sent_at: row.get("sent_at"),
        }
    }
}

impl TryFrom<EmailQueueRow> for EmailJob {
    type Error = DomainError;

    fn try_from(row: EmailQueueRow) -> Result<Self, Self::Error> {
        Ok(OutboxJob {
            id: row.id,
            payload: EmailPayload {
                to_email: row.to_email,
                subject: row.subject,
                html: row.html,
            },
            status: row.status.parse::<JobStatus>()?,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            last_error: row.last_error,
            created_at: row.created_at,
            processed_at: row.processed_at,
            sent_at: row.sent_at,
        })
    }
}

/// PostgreSQL implementation of EmailOutboxRepository trait.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never receive
/// the same job; completion updates are guarded on `status = 'processing'`.
#[derive(Clone)]
pub struct PostgresEmailOutboxRepository {
    client: PostgresClient,
}

impl PostgresEmailOutboxRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmailOutboxRepository for PostgresEmailOutboxRepository {
    #[instrument(skip(self, job), fields(subject = %job.subject))]
    async fn enqueue(&self, job: NewEmailJob) -> DomainResult<EmailJob> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "INSERT INTO email_queue (to_email, subject, html, max_retries)
                 VALUES ($1, $2, $3, $4)
                 RETURNING *",
                &[&job.to_email, &job.subject, &job.html, &job.max_retries],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let job = EmailJob::try_from(EmailQueueRow::from(&row))?;
        debug!(job_id = job.id, "email job enqueued");
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn claim_batch(&self, limit: i64) -> DomainResult<Vec<EmailJob>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "UPDATE email_queue q
                 SET status = 'processing', processed_at = NOW()
                 FROM (
                    SELECT id FROM email_queue
                    WHERE status = 'pending' AND retry_count < max_retries
                    ORDER BY created_at ASC, id ASC
                    LIMIT $1
                    FOR UPDATE SKIP LOCKED
                 ) claimable
                 WHERE q.id = claimable.id
                 RETURNING q.*",
                &[&limit],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        // RETURNING carries no ordering guarantee
        let mut jobs = rows
            .iter()
            .map(|row| EmailJob::try_from(EmailQueueRow::from(row)))
            .collect::<DomainResult<Vec<_>>>()?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if !jobs.is_empty() {
            debug!(claimed = jobs.len(), "claimed email jobs");
        }
        Ok(jobs)
    }

    #[instrument(skip(self), fields(job_id = job_id))]
    async fn mark_sent(&self, job_id: i64) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "UPDATE email_queue
                 SET status = 'sent', sent_at = NOW(), last_error = NULL
                 WHERE id = $1 AND status = 'processing'",
                &[&job_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::JobNotClaimed(job_id));
        }

        Ok(())
    }

    #[instrument(skip(self, outcome), fields(job_id = job_id, status = %outcome.status()))]
    async fn record_failure(&self, job_id: i64, outcome: FailureOutcome) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let sql = match outcome {
            FailureOutcome::Retry { .. } => {
                "UPDATE email_queue
                 SET status = 'pending', retry_count = $2, last_error = $3, processed_at = NULL
                 WHERE id = $1 AND status = 'processing'"
            }
            FailureOutcome::Exhausted { .. } => {
                "UPDATE email_queue
                 SET status = 'failed', retry_count = $2, last_error = $3, processed_at = NOW()
                 WHERE id = $1 AND status = 'processing'"
            }
        };

        let rows_affected = conn
            .execute(sql, &[&job_id, &outcome.retry_count(), &outcome.last_error()])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::JobNotClaimed(job_id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn release_stale(&self, older_than: Duration) -> DomainResult<u64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let released = conn
            .execute(
                "UPDATE email_queue
                 SET status = 'pending',
                     processed_at = NULL,
                     last_error = COALESCE(last_error || '; ', '') || 'claim expired'
                 WHERE status = 'processing'
                   AND processed_at < NOW() - make_interval(secs => $1::float8)",
                &[&older_than.as_secs_f64()],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if released > 0 {
            warn!(released, "released stale email claims");
        } else {
            debug!("no stale email claims");
        }

        Ok(released)
    }
}
