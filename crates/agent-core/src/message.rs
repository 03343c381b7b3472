//! Conversation Messages
//!
//! Block-structured message format shared by the store, the handler and
//! every provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input, including tool results fed back to the model
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One tagged unit within a message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Narrative text
    Text { text: String },

    /// Model reasoning; shown to the user but never treated as a tool signal
    Thinking {
        thinking: String,
        /// Provider signature, replayed verbatim on later calls
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Encrypted reasoning; never displayed, replayed verbatim
    RedactedThinking { data: String },

    /// Request from the model to invoke a named tool
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Outcome of a `ToolUse`, correlated by `tool_use_id`
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking {
            thinking: thinking.into(),
            signature: None,
        }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }
}

/// A single turn in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Ordered content blocks
    pub content: Vec<ContentBlock>,

    /// Transcript copy of an assistant turn's narrative. Stored like any
    /// other message; providers skip it because the original assistant
    /// message already carries the same blocks.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub echo: bool,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content,
            echo: false,
            timestamp: Utc::now(),
        }
    }

    /// Create a user message with a single text block
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    /// Create an assistant message with a single text block
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentBlock::text(text)])
    }

    /// Wrap tool results in the user message that answers a tool-use turn
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, results)
    }

    /// Create the transcript echo of an assistant turn
    pub fn echo(text: impl Into<String>) -> Self {
        let mut msg = Self::assistant_text(text);
        msg.echo = true;
        msg
    }

    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use requests in the order they appear
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Check if the message contains any tool-use request
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Check if the message carries tool results
    pub fn has_tool_result(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user_text("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert!(!msg.echo);
    }

    #[test]
    fn test_tool_uses_in_order() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                ContentBlock::text("let me check"),
                ContentBlock::tool_use("a", "uuid", serde_json::json!({})),
                ContentBlock::tool_use("b", "base64", serde_json::json!({"text": "x"})),
            ],
        );

        let ids: Vec<_> = msg.tool_uses().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(msg.has_tool_use());
        assert!(!msg.has_tool_result());
    }

    #[test]
    fn test_block_wire_shape() {
        let block = ContentBlock::tool_result("toolu_1", "4");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "toolu_1");
        assert_eq!(json["is_error"], false);

        let thinking: ContentBlock =
            serde_json::from_str(r#"{"type":"thinking","thinking":"hmm"}"#).unwrap();
        assert_eq!(thinking, ContentBlock::thinking("hmm"));

        let redacted: ContentBlock =
            serde_json::from_str(r#"{"type":"redacted_thinking","data":"EmwKAhgB"}"#).unwrap();
        assert_eq!(
            redacted,
            ContentBlock::RedactedThinking {
                data: "EmwKAhgB".into()
            }
        );
    }

    #[test]
    fn test_echo_flag_round_trips_only_when_set() {
        let plain = serde_json::to_value(Message::assistant_text("hi")).unwrap();
        assert!(plain.get("echo").is_none());

        let echo = serde_json::to_value(Message::echo("hi")).unwrap();
        assert_eq!(echo["echo"], true);
    }
}
