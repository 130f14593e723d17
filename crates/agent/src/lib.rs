//! Agent runtime: the tool-calling conversation loop behind every reply.
//!
//! One turn loads the conversation history, asks the reasoning oracle what to do,
//! runs whatever inventory operations it requests, and repeats until the oracle
//! answers or the round budget runs out.
//!
//! # Modules
//!
//! - `llm` - oracle contract, reply normalization, scripted oracle for tests
//! - `chat_completions` - HTTP oracle for OpenAI-compatible endpoints
//! - `prompt` - the default system instruction and customer context
//! - `transcript` - the per-turn conversation view sent to the oracle
//! - `tools` - the fixed operation catalogue and its dispatcher
//! - `runtime` - `AgentRuntime::generate_reply`, the turn state machine

pub mod chat_completions;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;
pub mod transcript;

pub use chat_completions::ChatCompletionsOracle;
pub use llm::{
    normalize_text, OracleError, OracleTurn, ReasoningOracle, ScriptedOracle, ToolCallRequest,
    ToolDeclaration,
};
pub use runtime::{AgentRuntime, AgentSettings, TurnError, APOLOGY_REPLY, MAX_REASONING_ROUNDS};
pub use transcript::{Transcript, TranscriptEntry};
