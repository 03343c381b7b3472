//! Error Types
//!
//! Infrastructure failures only. Tool-domain failures (bad SQL, a thrown
//! JavaScript exception, a malformed JWT) are returned by tools as
//! `Error: ...` result text and never surface here.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool input could not be decoded into the tool's typed input
    #[error("Invalid input for tool '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },

    /// Tool backend failed (connection, runtime creation, timeout)
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Conversation store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Build an `InvalidInput` error for the named tool
    pub fn invalid_input(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_) | Self::ToolExecution(_)
        )
    }

    /// Convert to a message suitable for posting back into the chat
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::InvalidInput { tool, reason } => {
                format!("The tool '{tool}' was called with invalid input: {reason}")
            }
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::RateLimited(_) => "The AI service is rate limiting us. Please wait a moment.".into(),
            Self::Auth(_) => "The bot's AI credentials were rejected.".into(),
            _ => format!("An unexpected error occurred: {self}"),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(AgentError::ProviderUnavailable("down".into()).is_retryable());
        assert!(!AgentError::ToolNotFound("nope".into()).is_retryable());
    }

    #[test]
    fn test_user_message_names_tool() {
        let err = AgentError::invalid_input("base64", "missing field `text`");
        assert_eq!(
            err.user_message(),
            "The tool 'base64' was called with invalid input: missing field `text`"
        );
    }
}
