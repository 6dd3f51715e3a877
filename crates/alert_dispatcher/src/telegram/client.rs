use crate::domain::{ChannelError, ChatChannel};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Telegram Bot API settings
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base_url: String,
    pub bot_token: String,
    pub chat_id: String,
    pub timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Envelope wrapping every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Minimal Bot API client: identity check and text messages to one chat
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        anyhow::ensure!(!config.bot_token.trim().is_empty(), "Telegram bot token is not configured");
        anyhow::ensure!(!config.chat_id.trim().is_empty(), "Telegram chat id is not configured");

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Telegram HTTP client")?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// Bot identity, also proves the token is valid
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> Result<BotUser, ChannelError> {
        let response = self
            .http
            .get(self.endpoint("getMe"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        interpret_response::<BotUser>(status, &body)?
            .ok_or_else(|| ChannelError::InvalidResponse("getMe returned no result".to_string()))
    }

    #[instrument(skip(self, text), fields(chat_id = %self.config.chat_id, len = text.len()))]
    pub async fn send_message(&self, text: &str) -> Result<(), ChannelError> {
        let response = self
            .http
            .post(self.endpoint("sendMessage"))
            .json(&SendMessageRequest {
                chat_id: &self.config.chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        interpret_response::<serde_json::Value>(status, &body)?;
        debug!("telegram accepted message");
        Ok(())
    }

    /// reqwest errors carry the request URL, which embeds the bot token
    fn request_error(&self, error: reqwest::Error) -> ChannelError {
        if error.is_timeout() {
            ChannelError::Timeout(self.config.timeout)
        } else {
            ChannelError::Transport(error.without_url().to_string())
        }
    }
}

#[async_trait]
impl ChatChannel for TelegramClient {
    async fn check(&self) -> Result<String, ChannelError> {
        let me = self.get_me().await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.send_message(text).await
    }
}

const MAX_ERROR_BODY: usize = 512;

/// Success is HTTP 200 with `ok: true`; anything else is a failure
pub fn interpret_response<T: DeserializeOwned>(
    status: u16,
    body: &str,
) -> Result<Option<T>, ChannelError> {
    if status != 200 {
        let mut body = body.to_string();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(ChannelError::Http { status, body });
    }

    let envelope: ApiResponse<T> = serde_json::from_str(body)
        .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

    if !envelope.ok {
        return Err(ChannelError::Api(
            envelope
                .description
                .unwrap_or_else(|| "request was not ok".to_string()),
        ));
    }

    Ok(envelope.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "-100200".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_embeds_token() {
        let client = TelegramClient::new(TelegramConfig {
            api_base_url: "http://localhost:8081/".to_string(),
            ..config()
        })
        .unwrap();

        assert_eq!(
            client.endpoint("sendMessage"),
            "http://localhost:8081/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        assert!(TelegramClient::new(TelegramConfig::default()).is_err());
        assert!(TelegramClient::new(TelegramConfig {
            chat_id: String::new(),
            ..config()
        })
        .is_err());
    }

    #[test]
    fn test_ok_envelope_is_success() {
        let body = r#"{"ok":true,"result":{"id":42,"is_bot":true,"first_name":"Volt","username":"volt_bot"}}"#;
        let me = interpret_response::<BotUser>(200, body).unwrap().unwrap();

        assert_eq!(me.username.as_deref(), Some("volt_bot"));
    }

    #[test]
    fn test_not_ok_envelope_is_failure() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let result = interpret_response::<serde_json::Value>(200, body);

        assert!(matches!(result, Err(ChannelError::Api(d)) if d.contains("chat not found")));
    }

    #[test]
    fn test_non_200_is_failure() {
        let result = interpret_response::<serde_json::Value>(429, r#"{"ok":false}"#);

        assert!(matches!(result, Err(ChannelError::Http { status: 429, .. })));
    }

    #[test]
    fn test_garbage_body_is_failure() {
        let result = interpret_response::<serde_json::Value>(200, "<html>proxy error</html>");

        assert!(matches!(result, Err(ChannelError::InvalidResponse(_))));
    }

    #[test]
    fn test_send_message_payload_shape() {
        let payload = serde_json::to_value(SendMessageRequest {
            chat_id: "-100200",
            text: "hi",
            parse_mode: "HTML",
        })
        .unwrap();

        assert_eq!(
            payload,
            serde_json::json!({"chat_id": "-100200", "text": "hi", "parse_mode": "HTML"})
        );
    }
}
