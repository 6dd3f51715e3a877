//! Table-backed work queue.
//!
//! Lifecycle of a job:
//!
//! ```text
//! pending --claim--> processing --ok--> sent (terminal)
//!                    processing --err, retries left--> pending
//!                    processing --err, retries exhausted--> failed (terminal)
//! ```
//!
//! Exclusivity of the `pending -> processing` edge is enforced by the store
//! (row locks skipped by concurrent claimers), never by process-local state.

use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Sent => "sent",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Sent)
                | (JobStatus::Processing, JobStatus::Pending)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::UnknownJobStatus(other.to_string())),
        }
    }
}

/// One queued unit of work carrying a channel-specific payload
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxJob<P> {
    pub id: i64,
    pub payload: P,
    pub status: JobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// What happens to a claimed job after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `pending` for a later cycle
    Retry { retry_count: i32, last_error: String },
    /// Terminal `failed`
    Exhausted { retry_count: i32, last_error: String },
}

impl FailureOutcome {
    pub fn retry_count(&self) -> i32 {
        match self {
            FailureOutcome::Retry { retry_count, .. }
            | FailureOutcome::Exhausted { retry_count, .. } => *retry_count,
        }
    }

    pub fn last_error(&self) -> &str {
        match self {
            FailureOutcome::Retry { last_error, .. }
            | FailureOutcome::Exhausted { last_error, .. } => last_error,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            FailureOutcome::Retry { .. } => JobStatus::Pending,
            FailureOutcome::Exhausted { .. } => JobStatus::Failed,
        }
    }
}

impl<P> OutboxJob<P> {
    /// Apply the retry policy to a failed attempt of this job
    pub fn failure_outcome(&self, error: impl Into<String>) -> FailureOutcome {
        let retry_count = self.retry_count + 1;
        let last_error = error.into();
        if retry_count >= self.max_retries {
            FailureOutcome::Exhausted {
                retry_count,
                last_error,
            }
        } else {
            FailureOutcome::Retry {
                retry_count,
                last_error,
            }
        }
    }
}

/// Outbound email content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPayload {
    pub to_email: String,
    pub subject: String,
    pub html: String,
}

pub type EmailJob = OutboxJob<EmailPayload>;

/// Input for queueing an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmailJob {
    pub to_email: String,
    pub subject: String,
    pub html: String,
    pub max_retries: i32,
}

/// Email instantiation of the outbox
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmailOutboxRepository: Send + Sync {
    /// Insert a new job in `pending`
    async fn enqueue(&self, job: NewEmailJob) -> DomainResult<EmailJob>;

    /// Atomically move up to `limit` pending jobs to `processing`, oldest
    /// first, skipping rows another claimer currently holds
    async fn claim_batch(&self, limit: i64) -> DomainResult<Vec<EmailJob>>;

    /// `processing -> sent`
    async fn mark_sent(&self, job_id: i64) -> DomainResult<()>;

    /// `processing -> pending | failed` according to the outcome
    async fn record_failure(&self, job_id: i64, outcome: FailureOutcome) -> DomainResult<()>;

    /// Return jobs stuck in `processing` for longer than `older_than` to
    /// `pending`. Returns the number of released jobs.
    async fn release_stale(&self, older_than: Duration) -> DomainResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(retry_count: i32, max_retries: i32) -> EmailJob {
        OutboxJob {
            id: 1,
            payload: EmailPayload {
                to_email: "ops@example.com".to_string(),
                subject: "Code".to_string(),
                html: "<p>123456</p>".to_string(),
            },
            status: JobStatus::Processing,
            retry_count,
            max_retries,
            last_error: None,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
            sent_at: None,
        }
    }

    #[test]
    fn test_first_failure_goes_back_to_pending() {
        let outcome = job(0, 3).failure_outcome("connection refused");
        assert_eq!(
            outcome,
            FailureOutcome::Retry {
                retry_count: 1,
                last_error: "connection refused".to_string()
            }
        );
        assert_eq!(outcome.status(), JobStatus::Pending);
    }

    #[test]
    fn test_last_allowed_failure_is_terminal() {
        let outcome = job(2, 3).failure_outcome("timeout");
        assert_eq!(outcome.status(), JobStatus::Failed);
        assert_eq!(outcome.retry_count(), 3);
    }

    #[test]
    fn test_retry_count_never_exceeds_max_retries() {
        for max_retries in 1..=5 {
            let mut current = job(0, max_retries);
            loop {
                let outcome = current.failure_outcome("boom");
                assert!(outcome.retry_count() <= max_retries);
                current.retry_count = outcome.retry_count();
                if outcome.status() == JobStatus::Failed {
                    assert_eq!(current.retry_count, max_retries);
                    break;
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        let all = [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Sent,
            JobStatus::Failed,
        ];
        for terminal in [JobStatus::Sent, JobStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Sent));
    }

    #[test]
    fn test_status_parses_storage_names() {
        assert_eq!("processing".parse::<JobStatus>().unwrap(), JobStatus::Processing);
        assert!("queued".parse::<JobStatus>().is_err());
    }
}
