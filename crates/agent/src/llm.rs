use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transcript::Transcript;

/// One operation invocation requested by the oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    /// Correlation id echoed back with the result.
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { id: id.into(), name: name.into(), arguments }
    }
}

/// Name, description and JSON-schema parameters of an operation offered to the oracle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What the oracle decided for one round. Adapters normalize reply text before
/// building a `FinalAnswer`, and never build `ToolRequests` from an empty list.
#[derive(Clone, Debug, PartialEq)]
pub enum OracleTurn {
    FinalAnswer(String),
    ToolRequests(Vec<ToolCallRequest>),
}

impl OracleTurn {
    /// Builds the turn from a raw reply: requested calls win, otherwise `content`
    /// becomes the normalized final answer.
    pub fn from_reply(content: &Value, calls: Vec<ToolCallRequest>) -> Self {
        if calls.is_empty() {
            Self::FinalAnswer(normalize_text(content))
        } else {
            Self::ToolRequests(calls)
        }
    }

    pub fn answer(text: impl AsRef<str>) -> Self {
        Self::FinalAnswer(normalize_text(&Value::String(text.as_ref().to_string())))
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle response could not be understood: {0}")]
    InvalidResponse(String),
    #[error("oracle is misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Decides the next step for `transcript`, whose first entry is the system instruction.
    async fn reason(
        &self,
        transcript: &Transcript,
        tools: &[ToolDeclaration],
    ) -> Result<OracleTurn, OracleError>;
}

/// Flattens reply content into one string.
///
/// Accepts a plain string, a list of fragments (strings or objects with a `text` field),
/// or a single object with a `text` field. Fragments are trimmed, empty ones dropped, and
/// the rest joined with newlines. Anything else normalizes to the empty string.
pub fn normalize_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.trim().to_string(),
        Value::Array(fragments) => fragments
            .iter()
            .filter_map(fragment_text)
            .map(str::trim)
            .filter(|fragment| !fragment.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        Value::Object(_) => fragment_text(content).map(str::trim).unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

fn fragment_text(fragment: &Value) -> Option<&str> {
    match fragment {
        Value::String(text) => Some(text),
        Value::Object(object) => object.get("text").and_then(Value::as_str),
        _ => None,
    }
}

/// Replays a fixed list of turns and records every transcript it was shown.
/// Once the script runs out it repeats `fallback`, or fails when there is none.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<OracleTurn, String>>>,
    fallback: Option<OracleTurn>,
    seen: Mutex<Vec<Transcript>>,
}

impl ScriptedOracle {
    pub fn new(turns: impl IntoIterator<Item = OracleTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into_iter().map(Ok).collect()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// An oracle that answers every round with `turn`.
    pub fn repeating(turn: OracleTurn) -> Self {
        Self { fallback: Some(turn), ..Self::default() }
    }

    /// Queues a failure after the turns already scripted.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(Err(message.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn reason(
        &self,
        transcript: &Transcript,
        _tools: &[ToolDeclaration],
    ) -> Result<OracleTurn, OracleError> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).push(transcript.clone());

        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(Ok(turn)) => Ok(turn),
            Some(Err(message)) => Err(OracleError::Transport(message)),
            None => self.fallback.clone().ok_or_else(|| {
                OracleError::InvalidResponse("scripted oracle has no turns left".to_string())
            }),
        }
    }
}
