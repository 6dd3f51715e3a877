use crate::domain::{DeliveryError, EmailTransport};
use anyhow::ensure;
use common::domain::{DomainResult, EmailJob, EmailOutboxRepository, EmailPayload, FailureOutcome};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct EmailWorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Upper bound on verify + send for one job
    pub send_timeout: Duration,
    /// Claims older than this are assumed abandoned by a dead worker
    pub stale_claim_timeout: Duration,
}

impl Default for EmailWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            send_timeout: Duration::from_secs(30),
            stale_claim_timeout: Duration::from_secs(300),
        }
    }
}

impl EmailWorkerConfig {
    /// Rejects settings the loop cannot run with. A stale-claim timeout at or
    /// below the send timeout would release claims that are still in flight.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.poll_interval.is_zero(), "email poll interval must be non-zero");
        ensure!(self.batch_size > 0, "email batch size must be positive");
        ensure!(!self.send_timeout.is_zero(), "email send timeout must be non-zero");
        ensure!(
            self.stale_claim_timeout > self.send_timeout,
            "stale claim timeout ({:?}) must exceed the send timeout ({:?})",
            self.stale_claim_timeout,
            self.send_timeout
        );
        Ok(())
    }

    /// Longest one cycle can run once started, given a bound on each store
    /// call: release, claim, the concurrent attempts, then one status write.
    pub fn cycle_budget(&self, store_call_bound: Duration) -> Duration {
        self.send_timeout + store_call_bound * 3
    }
}

/// Tally of one polling cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub released: u64,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Attempts whose outcome could not be written back
    pub unrecorded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Sent,
    Retried,
    Failed,
    Unrecorded,
}

/// Drains the email outbox.
///
/// Each cycle releases stale claims, claims up to `batch_size` pending jobs,
/// attempts them concurrently and records every outcome before the next
/// cycle may start.
pub struct EmailDeliveryWorker {
    outbox: Arc<dyn EmailOutboxRepository>,
    transport: Arc<dyn EmailTransport>,
    config: EmailWorkerConfig,
}

impl EmailDeliveryWorker {
    pub fn new(
        outbox: Arc<dyn EmailOutboxRepository>,
        transport: Arc<dyn EmailTransport>,
        config: EmailWorkerConfig,
    ) -> Self {
        Self {
            outbox,
            transport,
            config,
        }
    }

    /// Poll until cancelled. The first cycle starts immediately; a cycle in
    /// flight when cancellation arrives always runs to completion.
    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.config.validate()?;
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "starting email delivery worker"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping email delivery worker");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.run_cycle().await {
                Ok(report) if report.claimed > 0 || report.released > 0 => {
                    info!(
                        claimed = report.claimed,
                        sent = report.sent,
                        retried = report.retried,
                        failed = report.failed,
                        released = report.released,
                        "email cycle finished"
                    );
                }
                Ok(_) => debug!("no email jobs to process"),
                Err(e) => error!(error = %e, "email cycle failed"),
            }
        }

        info!("email delivery worker stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> DomainResult<CycleReport> {
        let released = self
            .outbox
            .release_stale(self.config.stale_claim_timeout)
            .await?;

        let jobs = self.outbox.claim_batch(self.config.batch_size).await?;
        let mut report = CycleReport {
            released,
            claimed: jobs.len(),
            ..Default::default()
        };

        let outcomes = join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
        for outcome in outcomes {
            match outcome {
                JobOutcome::Sent => report.sent += 1,
                JobOutcome::Retried => report.retried += 1,
                JobOutcome::Failed => report.failed += 1,
                JobOutcome::Unrecorded => report.unrecorded += 1,
            }
        }

        Ok(report)
    }

    #[instrument(skip(self, job), fields(job_id = job.id, attempt = job.retry_count + 1))]
    async fn process_job(&self, job: EmailJob) -> JobOutcome {
        match self.deliver(&job.payload).await {
            Ok(()) => match self.outbox.mark_sent(job.id).await {
                Ok(()) => {
                    info!(job_id = job.id, "email sent");
                    JobOutcome::Sent
                }
                Err(e) => {
                    error!(job_id = job.id, error = %e, "email sent but status update failed");
                    JobOutcome::Unrecorded
                }
            },
            Err(delivery_error) => {
                let outcome = job.failure_outcome(delivery_error.to_string());
                match &outcome {
                    FailureOutcome::Retry { retry_count, .. } => warn!(
                        job_id = job.id,
                        retry_count,
                        max_retries = job.max_retries,
                        error = %delivery_error,
                        "email delivery failed, will retry"
                    ),
                    FailureOutcome::Exhausted { retry_count, .. } => error!(
                        job_id = job.id,
                        retry_count,
                        error = %delivery_error,
                        "email delivery failed permanently"
                    ),
                }

                let result = match outcome {
                    FailureOutcome::Retry { .. } => JobOutcome::Retried,
                    FailureOutcome::Exhausted { .. } => JobOutcome::Failed,
                };

                if let Err(e) = self.outbox.record_failure(job.id, outcome).await {
                    error!(job_id = job.id, error = %e, "failed to record email delivery failure");
                    return JobOutcome::Unrecorded;
                }
                result
            }
        }
    }

    async fn deliver(&self, payload: &EmailPayload) -> Result<(), DeliveryError> {
        let attempt = async {
            self.transport.verify().await?;
            self.transport.send(payload).await
        };

        tokio::time::timeout(self.config.send_timeout, attempt)
            .await
            .map_err(|_| DeliveryError::Timeout(self.config.send_timeout))?
    }
}
