use crate::domain::{DeliveryError, EmailTransport};
use crate::smtp::SmtpConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use common::domain::EmailPayload;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// SMTP delivery through lettre's tokio transport
#[derive(Clone)]
pub struct LettreSmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl LettreSmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let (Some(host), Some(username), Some(password)) =
            (&config.host, &config.username, &config.password)
        else {
            anyhow::bail!("SMTP host, username and password are required");
        };

        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", config.from))?;

        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .with_context(|| format!("failed to create SMTP transport for {}", host))?;

        let mailer = builder
            .port(config.port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .timeout(Some(config.timeout))
            .build();

        info!(host = %host, port = config.port, user = %username, "SMTP transport configured");

        Ok(Self { mailer, from })
    }

    fn build_message(&self, email: &EmailPayload) -> Result<Message, DeliveryError> {
        let to: Mailbox = email
            .to_email
            .parse()
            .map_err(|e| DeliveryError::InvalidMessage(format!("recipient {}: {}", email.to_email, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl EmailTransport for LettreSmtpTransport {
    async fn verify(&self) -> Result<(), DeliveryError> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Transport(
                "SMTP server did not accept the connection".to_string(),
            )),
            Err(e) => Err(DeliveryError::Transport(e.to_string())),
        }
    }

    async fn send(&self, email: &EmailPayload) -> Result<(), DeliveryError> {
        let message = self.build_message(email)?;

        let response = self.mailer.send(message).await.map_err(|e| {
            if e.is_permanent() {
                DeliveryError::Rejected(e.to_string())
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        debug!(code = %response.code(), "SMTP server accepted message");
        Ok(())
    }
}
