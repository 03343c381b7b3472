//! # agent-core
//!
//! Conversation model, tool registry and the tool-use loop behind the Slack
//! agent. Provider-agnostic: the model is reached through [`LlmProvider`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     run_conversation                          │
//! │  ┌─────────────┐  ┌────────────────┐  ┌───────────────────┐  │
//! │  │    Agent    │──│ MessageHandler │──│   ToolRegistry    │  │
//! │  │ call_llm /  │  └───────┬────────┘  └───────────────────┘  │
//! │  │ loop_turn   │          │                                   │
//! │  └──────┬──────┘  ┌───────┴───────────┐                       │
//! │         │         │ ConversationStore │                       │
//! │  ┌──────┴──────┐  └───────────────────┘                       │
//! │  │ LlmProvider │                                              │
//! │  └─────────────┘                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each `call_llm` / `loop_turn` performs exactly one model call. The
//! orchestrator keeps calling `loop_turn` while tools were invoked, up to
//! a fixed bound.

pub mod agent;
pub mod error;
pub mod handler;
pub mod message;
pub mod mock;
pub mod orchestrator;
pub mod provider;
pub mod store;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentConfig, TurnGuard};
pub use error::{AgentError, Result};
pub use handler::{LlmResponse, MessageHandler};
pub use message::{ContentBlock, Message, Role};
pub use orchestrator::{ReplySink, RunOutcome, TurnSummary, run_conversation};
pub use provider::{Completion, FinishReason, GenerationOptions, LlmProvider, LlmRequest, TokenUsage};
pub use store::{ConversationKey, ConversationStore, MemoryConversationStore};
pub use tool::{ParameterSchema, Tool, ToolRegistry, ToolSchema, parse_input};
