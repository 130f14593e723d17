use tripdesk_core::domain::message::{Message, MessageDirection};

use crate::llm::ToolCallRequest;

#[derive(Clone, Debug, PartialEq)]
pub enum TranscriptEntry {
    System(String),
    User(String),
    Assistant(String),
    /// The oracle's own turn when it asked for operations.
    ToolRequests(Vec<ToolCallRequest>),
    ToolResult { call_id: String, content: String },
}

/// The ordered conversation view for one turn. Always starts with the system instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self { entries: vec![TranscriptEntry::System(system_instruction.into())] }
    }

    /// System instruction, then `history` in the order given (oldest first), then the
    /// new inbound text.
    pub fn from_history(
        system_instruction: impl Into<String>,
        history: &[Message],
        inbound_text: &str,
    ) -> Self {
        let mut transcript = Self::new(system_instruction);
        for message in history {
            let content = message.content.clone().unwrap_or_default();
            match message.direction {
                MessageDirection::In => transcript.push_user(content),
                MessageDirection::Out => transcript.push_assistant(content),
            }
        }
        transcript.push_user(inbound_text);
        transcript
    }

    pub fn system_instruction(&self) -> &str {
        match self.entries.first() {
            Some(TranscriptEntry::System(instruction)) => instruction,
            _ => "",
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::User(text.into()));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::Assistant(text.into()));
    }

    pub fn push_tool_requests(&mut self, requests: Vec<ToolCallRequest>) {
        self.entries.push(TranscriptEntry::ToolRequests(requests));
    }

    pub fn push_tool_result(&mut self, call_id: impl Into<String>, content: impl Into<String>) {
        self.entries.push(TranscriptEntry::ToolResult { call_id: call_id.into(), content: content.into() });
    }
}
