//! LLM Provider Strategy Pattern
//!
//! Defines the narrow interface the agent uses to reach a model. The agent
//! works exclusively through this trait; concrete HTTP clients live in
//! `agent-runtime`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, LlmRequest};
//!
//! let completion = provider.complete(&request).await?;
//! for (id, name, input) in completion.message.tool_uses() {
//!     // ...
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolSchema;

/// Fixed instructions steering replies toward what Slack can render
pub const SLACK_FORMATTING_PROMPTS: [&str; 2] = [
    "You are replying inside Slack. Slack does not render Markdown emphasis: never use **bold**, __underline__ or # headings. Use plain sentences, simple hyphen lists and `inline code` only.",
    "When you show code or tool output, wrap it in a triple-backtick block without a language tag; Slack ignores language hints and prints them verbatim.",
];

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Token budget for extended thinking (0 disables thinking)
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// System instructions sent with every call
    #[serde(default = "default_system_prompts")]
    pub system_prompts: Vec<String>,
}

const fn default_max_tokens() -> u32 {
    20_000
}
const fn default_thinking_budget() -> u32 {
    1024
}
fn default_system_prompts() -> Vec<String> {
    SLACK_FORMATTING_PROMPTS.iter().map(|s| (*s).to_string()).collect()
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: default_max_tokens(),
            thinking_budget: default_thinking_budget(),
            system_prompts: default_system_prompts(),
        }
    }
}

/// One model call: full history, advertised tools and fixed options
#[derive(Clone, Debug)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub options: GenerationOptions,
}

/// Response from an LLM completion
#[derive(Clone, Debug)]
pub struct Completion {
    /// The assistant message exactly as the model produced it
    pub message: Message,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

/// Token usage statistics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    Refusal,
    Other,
}

impl FinishReason {
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "end_turn" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            "refusal" => Self::Refusal,
            _ => Self::Other,
        }
    }
}

/// Strategy trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Check if the provider is configured and reachable
    async fn health_check(&self) -> Result<bool>;

    /// Generate one assistant turn from the request
    async fn complete(&self, request: &LlmRequest) -> Result<Completion>;
}
