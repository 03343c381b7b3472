//! # agent-runtime
//!
//! Runtime providers for the Slack agent.
//!
//! ## Providers
//!
//! - **Anthropic**: Claude via the Messages API, with extended thinking
//!   and tool use
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::anthropic::{AnthropicConfig, AnthropicProvider};
//!
//! let provider = AnthropicProvider::new(AnthropicConfig::from_env()?)?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

pub mod anthropic;

pub use anthropic::{AnthropicConfig, AnthropicProvider};

// Re-export core types for convenience
pub use agent_core::{Agent, AgentError, LlmProvider, Message, Result, Role, Tool, ToolRegistry};
