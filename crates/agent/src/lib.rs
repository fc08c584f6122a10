//! Agent runtime: the single-call wrapper around a hosted completion API and
//! the conversation runner built on top of it.
//!
//! - `llm` - provider clients behind the `LlmClient` trait
//! - `runtime` - `ChatAgent` trait and `AgentRuntime`, which makes sure the
//!   system prompt leads the history and appends exactly one reply per call
//! - `conversation` - `ConversationRunner`, which plays an opening query and
//!   its scripted follow-ups turn by turn
//! - `telemetry` - optional per-call observers
//!
//! The model only ever sees the accumulated history; there is no incremental
//! protocol between turns.

pub mod conversation;
pub mod llm;
pub mod runtime;
pub mod telemetry;

pub use conversation::{ConversationOutcome, ConversationRunner};
pub use llm::{client_from_config, CompletionRequest, LlmClient, LlmError};
pub use runtime::{AgentError, AgentRuntime, ChatAgent, RuntimeBuildError};
pub use telemetry::{
    CallObserver, CallSpan, CallStart, InMemoryObserver, SpanStatus, TracingObserver,
};
