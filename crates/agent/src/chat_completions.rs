use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use tripdesk_core::config::LlmConfig;

use crate::llm::{OracleError, OracleTurn, ReasoningOracle, ToolCallRequest, ToolDeclaration};
use crate::transcript::{Transcript, TranscriptEntry};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint (OpenAI, Ollama).
pub struct ChatCompletionsOracle {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl ChatCompletionsOracle {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| OracleError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.effective_base_url().trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_body(&self, transcript: &Transcript, tools: &[ToolDeclaration]) -> Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": transcript.entries().iter().map(entry_to_message).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }
        body
    }

    async fn post_once(&self, body: &Value) -> Result<Value, Attempt> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            let retryable = error.is_timeout() || error.is_connect() || error.is_request();
            Attempt { error: OracleError::Transport(error.to_string()), retryable }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt {
                retryable: is_retryable_status(status),
                error: OracleError::Status { status: status.as_u16(), body },
            });
        }

        response.json::<Value>().await.map_err(|error| Attempt {
            error: OracleError::InvalidResponse(error.to_string()),
            retryable: false,
        })
    }
}

struct Attempt {
    error: OracleError,
    retryable: bool,
}

#[async_trait]
impl ReasoningOracle for ChatCompletionsOracle {
    async fn reason(
        &self,
        transcript: &Transcript,
        tools: &[ToolDeclaration],
    ) -> Result<OracleTurn, OracleError> {
        let body = self.request_body(transcript, tools);
        let mut attempt = 0;
        loop {
            match self.post_once(&body).await {
                Ok(response) => {
                    debug!(event_name = "agent.oracle.responded", attempt, "chat completion received");
                    return parse_completion(&response);
                }
                Err(Attempt { error, retryable }) if retryable && attempt < self.max_retries => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                    warn!(
                        event_name = "agent.oracle.retrying",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt { error, .. }) => return Err(error),
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn entry_to_message(entry: &TranscriptEntry) -> Value {
    match entry {
        TranscriptEntry::System(text) => json!({"role": "system", "content": text}),
        TranscriptEntry::User(text) => json!({"role": "user", "content": text}),
        TranscriptEntry::Assistant(text) => json!({"role": "assistant", "content": text}),
        TranscriptEntry::ToolRequests(requests) => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": requests
                .iter()
                .map(|request| json!({
                    "id": request.id,
                    "type": "function",
                    "function": {
                        "name": request.name,
                        "arguments": Value::Object(request.arguments.clone()).to_string(),
                    }
                }))
                .collect::<Vec<_>>(),
        }),
        TranscriptEntry::ToolResult { call_id, content } => {
            json!({"role": "tool", "tool_call_id": call_id, "content": content})
        }
    }
}

/// Turns a chat completion response into an [`OracleTurn`].
pub fn parse_completion(response: &Value) -> Result<OracleTurn, OracleError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| OracleError::InvalidResponse("response has no choices[0].message".to_string()))?;

    let calls = match message.get("tool_calls") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(calls)) => calls
            .iter()
            .enumerate()
            .map(|(index, call)| parse_tool_call(index, call))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(OracleError::InvalidResponse(format!("tool_calls is not a list: {other}")))
        }
    };

    let content = message.get("content").unwrap_or(&Value::Null);
    Ok(OracleTurn::from_reply(content, calls))
}

fn parse_tool_call(index: usize, call: &Value) -> Result<ToolCallRequest, OracleError> {
    let function = call
        .get("function")
        .ok_or_else(|| OracleError::InvalidResponse(format!("tool call {index} has no function")))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::InvalidResponse(format!("tool call {index} has no name")))?;
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map_or_else(|| format!("call_{index}"), str::to_string);

    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(OracleError::InvalidResponse(format!(
                    "arguments of `{name}` are not an object: {other}"
                )))
            }
            Err(error) => {
                return Err(OracleError::InvalidResponse(format!(
                    "arguments of `{name}` are not valid JSON: {error}"
                )))
            }
        },
        Some(other) => {
            return Err(OracleError::InvalidResponse(format!(
                "arguments of `{name}` are not an object: {other}"
            )))
        }
    };

    Ok(ToolCallRequest { id, name: name.to_string(), arguments })
}
