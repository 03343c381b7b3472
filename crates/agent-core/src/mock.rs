//! Scripted Provider
//!
//! For tests and offline demos. Replays queued responses in order and
//! records every request it receives.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{AgentError, Result};
use crate::message::{ContentBlock, Message, Role};
use crate::provider::{Completion, FinishReason, LlmProvider, LlmRequest};

/// Provider that answers from a script
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Vec<ContentBlock>>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an assistant turn made of `blocks`
    #[must_use]
    pub fn respond(self, blocks: Vec<ContentBlock>) -> Self {
        self.lock_script().push_back(Ok(blocks));
        self
    }

    /// Queue a provider failure
    #[must_use]
    pub fn fail(self, error: AgentError) -> Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<ContentBlock>>>> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &LlmRequest) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let blocks = self
            .lock_script()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))??;

        let message = Message::new(Role::Assistant, blocks);
        let finish_reason = if message.has_tool_use() {
            FinishReason::ToolUse
        } else {
            FinishReason::EndTurn
        };

        Ok(Completion {
            message,
            model: request.options.model.clone(),
            usage: None,
            finish_reason: Some(finish_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerationOptions;

    fn request() -> LlmRequest {
        LlmRequest {
            messages: vec![Message::user_text("hi")],
            tools: Vec::new(),
            options: GenerationOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let provider = ScriptedProvider::new()
            .respond(vec![ContentBlock::text("first")])
            .fail(AgentError::ProviderUnavailable("down".into()));

        let first = provider.complete(&request()).await.unwrap();
        assert_eq!(first.message.text(), "first");
        assert_eq!(first.finish_reason, Some(FinishReason::EndTurn));

        assert!(provider.complete(&request()).await.is_err());
        assert!(provider.complete(&request()).await.is_err());
        assert_eq!(provider.calls(), 3);
    }
}
