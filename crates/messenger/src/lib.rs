//! Messenger delivery channel.
//!
//! - **Webhook events** (`events`) - pull the sender and text out of page webhooks
//! - **Verification** (`verify`) - subscription handshake and payload signatures
//! - **Send API** (`send`) - sender actions and text replies through the Graph API
//!
//! ```text
//! Messenger → POST /webhook → verify → events → AgentRuntime → send → Messenger
//! ```

pub mod events;
pub mod send;
pub mod verify;

pub use events::{extract_message_event, InboundMessage, WebhookPayload};
pub use send::{
    split_for_delivery, DeliveryError, GraphSendClient, MessengerSender, SenderAction,
    MAX_TEXT_CHARS,
};
pub use verify::{verify_signature, verify_subscription, SignatureError, SubscriptionError};
