use crate::domain::{EmailDeliveryWorker, EmailTransport, EmailWorkerConfig};
use crate::smtp::{LettreSmtpTransport, SmtpConfig, UnconfiguredTransport};
use anyhow::{bail, Result};
use common::domain::EmailOutboxRepository;
use std::sync::Arc;
use tracing::{info, warn};
use voltwatch_runner::AppProcess;

/// Email delivery module: picks the SMTP transport and hosts the outbox worker
pub struct EmailWorker {
    worker: EmailDeliveryWorker,
}

impl EmailWorker {
    /// Unconfigured SMTP is only fatal when `smtp_required` is set; otherwise
    /// every attempt fails and jobs run out their retries.
    pub fn new(
        outbox: Arc<dyn EmailOutboxRepository>,
        smtp: &SmtpConfig,
        smtp_required: bool,
        config: EmailWorkerConfig,
    ) -> Result<Self> {
        info!("Initializing email delivery module");
        config.validate()?;

        let transport: Arc<dyn EmailTransport> = if smtp.is_configured() {
            Arc::new(LettreSmtpTransport::new(smtp)?)
        } else if smtp_required {
            bail!("SMTP is required but host, username or password is missing");
        } else {
            warn!("SMTP is not configured, queued emails will fail until it is");
            Arc::new(UnconfiguredTransport)
        };

        Ok(Self {
            worker: EmailDeliveryWorker::new(outbox, transport, config),
        })
    }

    pub fn into_runner_process(self) -> AppProcess {
        let worker = self.worker;
        Box::new(move |ctx| Box::pin(async move { worker.run(ctx).await }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MockEmailOutboxRepository;

    #[test]
    fn test_required_smtp_without_credentials_is_fatal() {
        let result = EmailWorker::new(
            Arc::new(MockEmailOutboxRepository::new()),
            &SmtpConfig::default(),
            true,
            EmailWorkerConfig::default(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_optional_smtp_without_credentials_starts() {
        let result = EmailWorker::new(
            Arc::new(MockEmailOutboxRepository::new()),
            &SmtpConfig::default(),
            false,
            EmailWorkerConfig::default(),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_worker_config_is_fatal() {
        let result = EmailWorker::new(
            Arc::new(MockEmailOutboxRepository::new()),
            &SmtpConfig::default(),
            false,
            EmailWorkerConfig {
                poll_interval: std::time::Duration::ZERO,
                ..Default::default()
            },
        );

        assert!(result.is_err());
    }
}
