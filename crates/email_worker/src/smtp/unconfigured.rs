use crate::domain::{DeliveryError, EmailTransport};
use async_trait::async_trait;
use common::domain::EmailPayload;

/// Stand-in used when no SMTP credentials are set. Every attempt fails, so
/// queued jobs burn their retries and end up `failed` with a clear reason.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredTransport;

#[async_trait]
impl EmailTransport for UnconfiguredTransport {
    async fn verify(&self) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }

    async fn send(&self, _email: &EmailPayload) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}
