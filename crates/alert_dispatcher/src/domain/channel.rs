use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("chat API error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Outbound chat channel for alert messages
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Reachability and credential check. Returns the bot's display handle.
    async fn check(&self) -> Result<String, ChannelError>;

    /// Deliver one HTML-formatted message
    async fn send_text(&self, text: &str) -> Result<(), ChannelError>;
}
