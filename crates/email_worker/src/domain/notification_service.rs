use crate::domain::{
    render_password_reset_email, render_two_factor_email, render_verification_email,
    RenderedEmail,
};
use common::domain::{
    DomainError, DomainResult, EmailJob, EmailOutboxRepository, NewEmailJob, DEFAULT_MAX_RETRIES,
};
use common::garde::validate_email_recipient;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Entry point for anything that needs to email a user. Jobs are only
/// written to the outbox here; delivery happens in the worker.
pub struct EmailNotificationService {
    outbox: Arc<dyn EmailOutboxRepository>,
    max_retries: i32,
}

impl EmailNotificationService {
    pub fn new(outbox: Arc<dyn EmailOutboxRepository>) -> Self {
        Self {
            outbox,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[instrument(skip(self, html))]
    pub async fn enqueue(&self, to_email: &str, subject: &str, html: &str) -> DomainResult<EmailJob> {
        validate_email_recipient(to_email)?;
        if subject.trim().is_empty() {
            return Err(DomainError::ValidationError("subject must not be empty".to_string()));
        }
        if self.max_retries < 1 {
            return Err(DomainError::ValidationError(format!(
                "max_retries must be at least 1, got {}",
                self.max_retries
            )));
        }

        let job = self
            .outbox
            .enqueue(NewEmailJob {
                to_email: to_email.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
                max_retries: self.max_retries,
            })
            .await?;

        debug!(job_id = job.id, "email queued");
        Ok(job)
    }

    pub async fn enqueue_verification_code(&self, to_email: &str, code: &str) -> DomainResult<EmailJob> {
        self.enqueue_rendered(to_email, code, render_verification_email).await
    }

    pub async fn enqueue_password_reset_code(&self, to_email: &str, code: &str) -> DomainResult<EmailJob> {
        self.enqueue_rendered(to_email, code, render_password_reset_email).await
    }

    pub async fn enqueue_two_factor_code(&self, to_email: &str, code: &str) -> DomainResult<EmailJob> {
        self.enqueue_rendered(to_email, code, render_two_factor_email).await
    }

    async fn enqueue_rendered(
        &self,
        to_email: &str,
        code: &str,
        render: fn(&str) -> RenderedEmail,
    ) -> DomainResult<EmailJob> {
        // Codes are interpolated into HTML unescaped
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::ValidationError(
                "code must be non-empty and alphanumeric".to_string(),
            ));
        }

        let email = render(code);
        self.enqueue(to_email, &email.subject, &email.html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{EmailPayload, JobStatus, MockEmailOutboxRepository, OutboxJob};

    fn echo_outbox() -> MockEmailOutboxRepository {
        let mut outbox = MockEmailOutboxRepository::new();
        outbox.expect_enqueue().returning(|job| {
            Ok(OutboxJob {
                id: 1,
                payload: EmailPayload {
                    to_email: job.to_email,
                    subject: job.subject,
                    html: job.html,
                },
                status: JobStatus::Pending,
                retry_count: 0,
                max_retries: job.max_retries,
                last_error: None,
                created_at: Utc::now(),
                processed_at: None,
                sent_at: None,
            })
        });
        outbox
    }

    #[tokio::test]
    async fn test_enqueue_uses_default_retry_budget() {
        let service = EmailNotificationService::new(Arc::new(echo_outbox()));

        let job = service
            .enqueue("operator@example.com", "Hello", "<p>hi</p>")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.max_retries, 3);
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_not_queued() {
        let mut outbox = MockEmailOutboxRepository::new();
        outbox.expect_enqueue().times(0);
        let service = EmailNotificationService::new(Arc::new(outbox));

        let result = service.enqueue("nobody", "Hello", "<p>hi</p>").await;

        assert!(matches!(result, Err(DomainError::InvalidRecipient(_))));
    }

    #[tokio::test]
    async fn test_zero_retry_budget_is_rejected() {
        let mut outbox = MockEmailOutboxRepository::new();
        outbox.expect_enqueue().times(0);
        let service = EmailNotificationService::new(Arc::new(outbox)).with_max_retries(0);

        let result = service.enqueue("operator@example.com", "Hello", "").await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_two_factor_code_renders_template() {
        let service = EmailNotificationService::new(Arc::new(echo_outbox()));

        let job = service
            .enqueue_two_factor_code("operator@example.com", "918273")
            .await
            .unwrap();

        assert_eq!(job.payload.subject, "Your sign-in code");
        assert!(job.payload.html.contains("918273"));
    }

    #[tokio::test]
    async fn test_code_with_markup_is_rejected() {
        let mut outbox = MockEmailOutboxRepository::new();
        outbox.expect_enqueue().times(0);
        let service = EmailNotificationService::new(Arc::new(outbox));

        let result = service
            .enqueue_verification_code("operator@example.com", "<b>1</b>")
            .await;

        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }
}
