use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    In,
    Out,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }
}

/// One persisted half of a conversation exchange. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub client_id: Option<ClientId>,
    pub direction: MessageDirection,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub client_id: Option<ClientId>,
    pub direction: MessageDirection,
    pub content: Option<String>,
}

impl NewMessage {
    pub fn inbound(client_id: ClientId, content: impl Into<String>) -> Self {
        Self { client_id: Some(client_id), direction: MessageDirection::In, content: Some(content.into()) }
    }

    pub fn outbound(client_id: ClientId, content: impl Into<String>) -> Self {
        Self { client_id: Some(client_id), direction: MessageDirection::Out, content: Some(content.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::MessageDirection;

    #[test]
    fn direction_parses_stored_values() {
        assert_eq!(MessageDirection::parse("in"), Some(MessageDirection::In));
        assert_eq!(MessageDirection::parse(" OUT "), Some(MessageDirection::Out));
        assert_eq!(MessageDirection::parse("sideways"), None);
        assert_eq!(MessageDirection::Out.as_str(), "out");
    }
}
