use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use tripdesk_core::config::MessengerConfig;

/// Longest text the Send API accepts in one message.
pub const MAX_TEXT_CHARS: usize = 2000;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenderAction {
    MarkSeen,
    TypingOn,
    TypingOff,
}

impl SenderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkSeen => "mark_seen",
            Self::TypingOn => "typing_on",
            Self::TypingOff => "typing_off",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("page access token is not configured")]
    MissingToken,
    #[error("send api transport failed: {0}")]
    Transport(String),
    #[error("send api returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait MessengerSender: Send + Sync {
    async fn send_action(&self, recipient_id: &str, action: SenderAction) -> Result<(), DeliveryError>;

    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Graph API `me/messages` client.
pub struct GraphSendClient {
    http: reqwest::Client,
    endpoint: String,
    page_access_token: SecretString,
}

impl GraphSendClient {
    pub fn from_config(config: &MessengerConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/me/messages", config.graph_api_base.trim_end_matches('/')),
            page_access_token: config.page_access_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, payload: Value) -> Result<(), DeliveryError> {
        let token = self.page_access_token.expose_secret();
        if token.trim().is_empty() {
            return Err(DeliveryError::MissingToken);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("access_token", token)])
            .json(&payload)
            .send()
            .await
            .map_err(|error| DeliveryError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

#[async_trait]
impl MessengerSender for GraphSendClient {
    async fn send_action(&self, recipient_id: &str, action: SenderAction) -> Result<(), DeliveryError> {
        self.post(action_payload(recipient_id, action)).await
    }

    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), DeliveryError> {
        let chunks = split_for_delivery(text, MAX_TEXT_CHARS);
        debug!(
            event_name = "egress.messenger.sending",
            chunks = chunks.len(),
            "delivering reply through send api"
        );
        for chunk in chunks {
            self.post(text_payload(recipient_id, &chunk)).await?;
        }
        Ok(())
    }
}

pub fn action_payload(recipient_id: &str, action: SenderAction) -> Value {
    json!({"recipient": {"id": recipient_id}, "sender_action": action.as_str()})
}

pub fn text_payload(recipient_id: &str, text: &str) -> Value {
    json!({
        "recipient": {"id": recipient_id},
        "message": {"text": text},
        "messaging_type": "RESPONSE",
    })
}

/// Splits `text` into chunks of at most `max_chars` characters, preferring line breaks,
/// then spaces. Empty text yields one empty chunk so the user still gets an answer.
pub fn split_for_delivery(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_limit = rest.char_indices().nth(max_chars).map_or(rest.len(), |(index, _)| index);
        let window = &rest[..hard_limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&index| index > 0)
            .unwrap_or(hard_limit);

        chunks.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
