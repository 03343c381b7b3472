//! Message Handler
//!
//! Turns one model response into tool executions, a persistence batch and
//! the text shown to the user.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::message::{ContentBlock, Message};
use crate::store::{ConversationKey, ConversationStore};
use crate::tool::ToolRegistry;

/// Outcome of one model turn, as seen by the orchestration layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmResponse {
    /// Text to post to the user
    pub message: String,

    /// True iff at least one tool ran, so the model should be asked again
    pub should_loop: bool,
}

impl LlmResponse {
    /// Terminal response that does not request another model call
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            should_loop: false,
        }
    }
}

/// Executes the tool requests of a model turn and records the turn
pub struct MessageHandler {
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    tool_timeout: Duration,
}

impl MessageHandler {
    pub fn new(
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            tools,
            store,
            tool_timeout,
        }
    }

    /// Handle one assistant message for the conversation at `key`.
    ///
    /// Nothing is stored if any tool invocation fails at the infrastructure
    /// level; the error is returned instead.
    pub async fn handle(&self, message: Message, key: &ConversationKey) -> Result<LlmResponse> {
        let mut narrative = String::new();
        for block in &message.content {
            match block {
                ContentBlock::Text { text } => {
                    narrative.push_str(text);
                    narrative.push('\n');
                }
                ContentBlock::Thinking { thinking, .. } => {
                    narrative.push_str(thinking);
                    narrative.push('\n');
                }
                _ => {}
            }
        }

        let mut display = narrative.clone();
        let mut results = Vec::new();

        for (id, name, input) in message.tool_uses() {
            let output = self.invoke(name, input.clone()).await?;
            tracing::debug!(
                key = %key,
                tool = %name,
                tool_use_id = %id,
                domain_error = output.starts_with("Error:"),
                "Tool finished"
            );

            display.push('\n');
            display.push_str(name);
            display.push_str(": \n");
            display.push_str(&output);

            results.push(ContentBlock::tool_result(id, output.trim()));
        }

        let should_loop = !results.is_empty();
        let narrative = narrative.trim();

        let mut batch = vec![message];
        if should_loop {
            batch.push(Message::tool_results(results));
        }
        if !narrative.is_empty() {
            batch.push(Message::echo(narrative));
        }

        self.store.append(key, batch).await?;

        Ok(LlmResponse {
            message: display.trim().to_string(),
            should_loop,
        })
    }

    async fn invoke(&self, name: &str, input: serde_json::Value) -> Result<String> {
        tokio::time::timeout(self.tool_timeout, self.tools.invoke(name, input))
            .await
            .map_err(|_| {
                AgentError::ToolExecution(format!(
                    "'{name}' did not finish within {}s",
                    self.tool_timeout.as_secs()
                ))
            })?
    }
}
