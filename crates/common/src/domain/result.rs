use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(i64),

    #[error("Invalid or inactive device credential")]
    InvalidDeviceCredential,

    #[error("Unknown alert type: {0}")]
    UnknownAlertType(String),

    #[error("Unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("Outbox job not found or not in processing state: {0}")]
    JobNotClaimed(i64),

    #[error("Alert not found: {0}")]
    AlertNotFound(i64),

    #[error("Invalid email recipient: {0}")]
    InvalidRecipient(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
