use serde::Deserialize;

/// The subset of a Messenger webhook body this service reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<Participant>,
    #[serde(default)]
    pub recipient: Option<Participant>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub text: String,
}

impl WebhookPayload {
    pub fn is_page_event(&self) -> bool {
        self.object.as_deref() == Some("page")
    }
}

/// First text message in a page webhook, scanning entries and their events in order.
/// Echoes of the page's own messages and events without text are skipped.
pub fn extract_message_event(payload: &WebhookPayload) -> Option<InboundMessage> {
    if !payload.is_page_event() {
        return None;
    }

    payload.entry.iter().flat_map(|entry| entry.messaging.iter()).find_map(|event| {
        let message = event.message.as_ref()?;
        if message.is_echo == Some(true) {
            return None;
        }
        let sender_id = event.sender.as_ref()?.id.as_deref().filter(|id| !id.is_empty())?;
        let text = message.text.as_ref()?;
        Some(InboundMessage { sender_id: sender_id.to_string(), text: text.clone() })
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_message_event, InboundMessage, WebhookPayload};

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).expect("payload")
    }

    #[test]
    fn first_text_message_wins() {
        let body = payload(json!({
            "object": "page",
            "entry": [
                {"id": "page-1", "messaging": [
                    {"sender": {"id": "u-1"}, "delivery": {"mids": ["m-0"]}},
                    {"sender": {"id": "u-1"}, "message": {"mid": "m-1", "attachments": []}}
                ]},
                {"id": "page-1", "messaging": [
                    {"sender": {"id": "u-2"}, "recipient": {"id": "page-1"}, "message": {"mid": "m-2", "text": "Are there trips to Paris?"}},
                    {"sender": {"id": "u-3"}, "message": {"mid": "m-3", "text": "later"}}
                ]}
            ]
        }));

        assert_eq!(
            extract_message_event(&body),
            Some(InboundMessage { sender_id: "u-2".to_string(), text: "Are there trips to Paris?".to_string() })
        );
    }

    #[test]
    fn non_page_objects_and_echoes_are_ignored() {
        let instagram = payload(json!({
            "object": "instagram",
            "entry": [{"messaging": [{"sender": {"id": "u-1"}, "message": {"text": "hi"}}]}]
        }));
        assert_eq!(extract_message_event(&instagram), None);

        let echo = payload(json!({
            "object": "page",
            "entry": [{"messaging": [{"sender": {"id": "page-1"}, "message": {"text": "our reply", "is_echo": true}}]}]
        }));
        assert_eq!(extract_message_event(&echo), None);
    }

    #[test]
    fn missing_fields_are_tolerated() {
        let sparse = payload(json!({"object": "page"}));
        assert_eq!(extract_message_event(&sparse), None);

        let no_sender = payload(json!({"object": "page", "entry": [{"messaging": [{"message": {"text": "hi"}}]}]}));
        assert_eq!(extract_message_event(&no_sender), None);
    }
}
