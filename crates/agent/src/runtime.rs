use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info};
use uuid::Uuid;

use tripdesk_core::config::AgentConfig;
use tripdesk_core::domain::message::NewMessage;
use tripdesk_db::repositories::{ClientRepository, MessageRepository, RepositoryError, SessionFactory};

use crate::llm::{OracleError, OracleTurn, ReasoningOracle};
use crate::prompt::{system_instruction_for, DEFAULT_SYSTEM_INSTRUCTION};
use crate::tools::{self, ToolError};
use crate::transcript::Transcript;

/// Oracle calls allowed per turn.
pub const MAX_REASONING_ROUNDS: u32 = 4;

/// Returned in place of a reply whenever a turn fails.
pub const APOLOGY_REPLY: &str =
    "Sorry, I had an issue handling your message. I will get back to you soon.";

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("session failure: {0}")]
    Session(#[from] RepositoryError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("operation failed: {0}")]
    Operation(#[from] ToolError),
    #[error("no final answer after {rounds} reasoning rounds")]
    RoundBudgetExhausted { rounds: u32 },
}

impl TurnError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Oracle(_) => "oracle",
            Self::Operation(_) => "operation",
            Self::RoundBudgetExhausted { .. } => "round_budget",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Session(error) => error.domain().map_or("repository", |domain| domain.code()),
            Self::Oracle(OracleError::Transport(_)) => "transport",
            Self::Oracle(OracleError::Status { .. }) => "http_status",
            Self::Oracle(OracleError::InvalidResponse(_)) => "invalid_response",
            Self::Oracle(OracleError::Configuration(_)) => "configuration",
            Self::Operation(error) => error.code(),
            Self::RoundBudgetExhausted { .. } => "exhausted",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub history_limit: u32,
    /// Wait before every oracle call, to stay under the provider's rate limits.
    pub pacing: Duration,
    pub serialize_conversations: bool,
    pub system_instruction: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            pacing: Duration::from_millis(1000),
            serialize_conversations: true,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            pacing: Duration::from_millis(config.pacing_millis),
            serialize_conversations: config.serialize_conversations,
            system_instruction: config
                .system_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        }
    }
}

/// One lock per conversation identity so turns of the same user run one at a time.
#[derive(Default)]
struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(conversation_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct AgentRuntime {
    sessions: Arc<dyn SessionFactory>,
    oracle: Arc<dyn ReasoningOracle>,
    settings: AgentSettings,
    locks: ConversationLocks,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        oracle: Arc<dyn ReasoningOracle>,
        settings: AgentSettings,
    ) -> Self {
        Self { sessions, oracle, settings, locks: ConversationLocks::default() }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Produces the reply for one inbound message. Never fails: any error is logged
    /// and answered with [`APOLOGY_REPLY`], and nothing is persisted for that turn.
    pub async fn generate_reply(&self, conversation_id: &str, inbound_text: &str) -> String {
        let turn_id = Uuid::new_v4();
        let _turn_guard = if self.settings.serialize_conversations {
            Some(self.locks.acquire(conversation_id).await)
        } else {
            None
        };

        info!(
            event_name = "agent.turn.started",
            correlation_id = %turn_id,
            conversation_id,
            inbound_chars = inbound_text.chars().count(),
            "turn started"
        );

        match self.run_turn(turn_id, conversation_id, inbound_text).await {
            Ok(reply) => {
                info!(
                    event_name = "agent.turn.completed",
                    correlation_id = %turn_id,
                    conversation_id,
                    reply_chars = reply.chars().count(),
                    "turn completed"
                );
                reply
            }
            Err(turn_error) => {
                error!(
                    event_name = "agent.turn.failed",
                    correlation_id = %turn_id,
                    conversation_id,
                    error_class = turn_error.class(),
                    error_code = turn_error.code(),
                    error = %turn_error,
                    "turn failed, replying with apology"
                );
                APOLOGY_REPLY.to_string()
            }
        }
    }

    /// The turn itself, with errors surfaced. The session opened here lives until
    /// the function returns on any path.
    pub async fn run_turn(
        &self,
        turn_id: Uuid,
        conversation_id: &str,
        inbound_text: &str,
    ) -> Result<String, TurnError> {
        let mut session = self.sessions.open().await?;
        let client = session.resolve_or_create_client(conversation_id).await?;
        let history = session.recent_messages(client.id, self.settings.history_limit).await?;

        let instruction = system_instruction_for(&self.settings.system_instruction, &client);
        let mut transcript = Transcript::from_history(instruction, &history, inbound_text);
        let declarations = tools::declarations();

        for round in 1..=MAX_REASONING_ROUNDS {
            if !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }
            info!(
                event_name = "agent.oracle.requested",
                correlation_id = %turn_id,
                conversation_id,
                round,
                transcript_entries = transcript.len(),
                "consulting reasoning oracle"
            );

            let requests = match self.oracle.reason(&transcript, &declarations).await? {
                OracleTurn::FinalAnswer(reply) => {
                    session
                        .append_exchange(
                            NewMessage::inbound(client.id, inbound_text),
                            NewMessage::outbound(client.id, reply.clone()),
                        )
                        .await?;
                    return Ok(reply);
                }
                OracleTurn::ToolRequests(requests) => requests,
            };

            transcript.push_tool_requests(requests.clone());
            for request in &requests {
                let result = tools::dispatch(session.as_mut(), request).await?;
                info!(
                    event_name = "agent.tool.dispatched",
                    correlation_id = %turn_id,
                    conversation_id,
                    round,
                    tool = %request.name,
                    call_id = %request.id,
                    result_chars = result.len(),
                    "operation dispatched"
                );
                transcript.push_tool_result(request.id.clone(), result);
            }
        }

        Err(TurnError::RoundBudgetExhausted { rounds: MAX_REASONING_ROUNDS })
    }
}
