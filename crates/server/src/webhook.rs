use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use secrecy::SecretString;
use tracing::{info, warn};
use tripdesk_agent::AgentRuntime;
use tripdesk_core::config::MessengerConfig;
use tripdesk_messenger::{
    extract_message_event, verify_signature, verify_subscription, InboundMessage,
    MessengerSender, SenderAction, WebhookPayload,
};
use uuid::Uuid;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Clone)]
pub struct WebhookState {
    runtime: Arc<AgentRuntime>,
    sender: Arc<dyn MessengerSender>,
    verify_token: SecretString,
    app_secret: Option<SecretString>,
}

impl WebhookState {
    pub fn new(
        runtime: Arc<AgentRuntime>,
        sender: Arc<dyn MessengerSender>,
        config: &MessengerConfig,
    ) -> Self {
        Self {
            runtime,
            sender,
            verify_token: config.verify_token.clone(),
            app_secret: config.app_secret.clone(),
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", get(subscribe).post(receive)).with_state(state)
}

/// Subscription handshake: echoes `hub.challenge` back when the verify token matches.
pub async fn subscribe(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    match verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        &state.verify_token,
    ) {
        Ok(challenge) => {
            info!(
                event_name = "ingress.messenger.subscribed",
                correlation_id = "handshake",
                "webhook subscription verified"
            );
            (StatusCode::OK, challenge)
        }
        Err(error) => {
            warn!(
                event_name = "ingress.messenger.subscription_rejected",
                correlation_id = "handshake",
                error = %error,
                "webhook subscription rejected"
            );
            (StatusCode::FORBIDDEN, "Forbidden".to_string())
        }
    }
}

pub async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let delivery_id = Uuid::new_v4();

    if let Some(app_secret) = &state.app_secret {
        let header = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
        if let Err(error) = verify_signature(app_secret, &body, header) {
            warn!(
                event_name = "ingress.messenger.signature_rejected",
                correlation_id = %delivery_id,
                error = %error,
                "webhook payload failed signature check"
            );
            return StatusCode::FORBIDDEN;
        }
    }

    let payload = match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "ingress.messenger.malformed",
                correlation_id = %delivery_id,
                error = %error,
                "webhook payload is not valid json"
            );
            return StatusCode::BAD_REQUEST;
        }
    };
    if !payload.is_page_event() {
        return StatusCode::NOT_FOUND;
    }

    match extract_message_event(&payload) {
        Some(message) => handle_message(&state, delivery_id, message).await,
        None => info!(
            event_name = "ingress.messenger.ignored",
            correlation_id = %delivery_id,
            "page event carried no text message"
        ),
    }
    StatusCode::OK
}

async fn handle_message(state: &WebhookState, delivery_id: Uuid, message: InboundMessage) {
    let conversation_id = message.sender_id.as_str();
    info!(
        event_name = "ingress.messenger.received",
        correlation_id = %delivery_id,
        conversation_id,
        "inbound message received"
    );

    send_action(state, delivery_id, conversation_id, SenderAction::MarkSeen).await;
    send_action(state, delivery_id, conversation_id, SenderAction::TypingOn).await;

    let reply = state.runtime.generate_reply(conversation_id, &message.text).await;

    match state.sender.send_text(conversation_id, &reply).await {
        Ok(()) => info!(
            event_name = "ingress.messenger.replied",
            correlation_id = %delivery_id,
            conversation_id,
            "reply delivered"
        ),
        Err(error) => warn!(
            event_name = "ingress.messenger.reply_failed",
            correlation_id = %delivery_id,
            conversation_id,
            error = %error,
            "reply could not be delivered"
        ),
    }

    send_action(state, delivery_id, conversation_id, SenderAction::TypingOff).await;
}

async fn send_action(
    state: &WebhookState,
    delivery_id: Uuid,
    conversation_id: &str,
    action: SenderAction,
) {
    if let Err(error) = state.sender.send_action(conversation_id, action).await {
        warn!(
            event_name = "ingress.messenger.action_failed",
            correlation_id = %delivery_id,
            conversation_id,
            action = action.as_str(),
            error = %error,
            "sender action failed"
        );
    }
}
