use async_trait::async_trait;
use common::domain::EmailPayload;
use std::time::Duration;
use thiserror::Error;

/// Why a single delivery attempt failed. Rendered into the job's `last_error`.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("SMTP transport is not configured")]
    NotConfigured,

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("message rejected by SMTP server: {0}")]
    Rejected(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Outbound email channel
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Handshake with the server without sending anything
    async fn verify(&self) -> Result<(), DeliveryError>;

    async fn send(&self, email: &EmailPayload) -> Result<(), DeliveryError>;
}
