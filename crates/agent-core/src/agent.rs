//! Agent Driver
//!
//! Two entry points, `call_llm` and `loop_turn`. The caller drives the
//! iteration (see [`crate::orchestrator`]); each entry point performs
//! exactly one model call.
//!
//! Both take the conversation's turn lock for one call. A caller that makes
//! several calls in a row takes it once with [`Agent::lock`] and uses the
//! `_in` variants, so no other turn on that key can land in between.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AgentError, Result};
use crate::handler::{LlmResponse, MessageHandler};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider, LlmRequest};
use crate::store::{ConversationKey, ConversationStore, MemoryConversationStore};
use crate::tool::ToolRegistry;

/// Reply used when there is nothing to send and no history to fall back on
pub const DEFAULT_GUIDANCE: &str =
    "Mention me with a question or a task and I'll get to work. I can run JavaScript, query the database, decode JWTs, base64-encode text and mint UUIDs.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Generation options sent with every call
    pub generation: GenerationOptions,

    /// Extra model calls allowed after the first one in a single event
    pub max_loops: usize,

    /// Upper bound on a single tool invocation
    pub tool_timeout: Duration,

    /// Canned reply for empty input on an empty conversation
    pub guidance_message: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            max_loops: 10,
            tool_timeout: Duration::from_secs(30),
            guidance_message: DEFAULT_GUIDANCE.into(),
        }
    }
}

/// One lock per conversation key, created on first use
#[derive(Default)]
struct TurnLocks {
    locks: Mutex<HashMap<ConversationKey, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    async fn acquire(&self, key: &ConversationKey) -> TurnGuard {
        let lock = self
            .locks
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone();
        TurnGuard {
            key: key.clone(),
            _guard: lock.lock_owned().await,
        }
    }
}

/// Exclusive hold on one conversation key; released on drop
pub struct TurnGuard {
    key: ConversationKey,
    _guard: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub const fn key(&self) -> &ConversationKey {
        &self.key
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    handler: MessageHandler,
    config: AgentConfig,
    turns: TurnLocks,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        let handler = MessageHandler::new(tools.clone(), store.clone(), config.tool_timeout);
        Self {
            provider,
            tools,
            store,
            handler,
            config,
            turns: TurnLocks::default(),
        }
    }

    /// Record `text` (if any) and ask the model for the next turn.
    ///
    /// Empty text on an empty conversation returns the guidance message
    /// without calling the model.
    pub async fn call_llm(&self, key: &ConversationKey, text: &str) -> Result<LlmResponse> {
        let turn = self.lock(key).await;
        self.call_llm_in(&turn, text).await
    }

    /// Ask the model again using only the stored history
    pub async fn loop_turn(&self, key: &ConversationKey) -> Result<LlmResponse> {
        let turn = self.lock(key).await;
        self.loop_turn_in(&turn).await
    }

    /// Wait for exclusive use of `key`
    pub async fn lock(&self, key: &ConversationKey) -> TurnGuard {
        self.turns.acquire(key).await
    }

    /// [`Agent::call_llm`] under a lock the caller already holds
    pub async fn call_llm_in(&self, turn: &TurnGuard, text: &str) -> Result<LlmResponse> {
        let key = turn.key();
        let text = text.trim();
        if !text.is_empty() {
            self.store.append(key, vec![Message::user_text(text)]).await?;
        }

        if self.store.len(key).await? == 0 {
            tracing::debug!(key = %key, "Empty input on empty conversation");
            return Ok(LlmResponse::done(self.config.guidance_message.clone()));
        }

        self.turn(key).await
    }

    /// [`Agent::loop_turn`] under a lock the caller already holds
    pub async fn loop_turn_in(&self, turn: &TurnGuard) -> Result<LlmResponse> {
        self.turn(turn.key()).await
    }

    async fn turn(&self, key: &ConversationKey) -> Result<LlmResponse> {
        let request = LlmRequest {
            messages: self.store.history(key).await?,
            tools: self.tools.schemas(),
            options: self.config.generation.clone(),
        };

        tracing::debug!(
            key = %key,
            provider = %self.provider.name(),
            messages = request.messages.len(),
            "Calling LLM"
        );

        let completion = self.provider.complete(&request).await?;

        if let Some(usage) = &completion.usage {
            tracing::debug!(
                key = %key,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                finish_reason = ?completion.finish_reason,
                "LLM responded"
            );
        }

        self.handler.handle(completion.message, key).await
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get the conversation store
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    store: Option<Arc<dyn ConversationStore>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(Arc::new(tools));
        self
    }

    #[must_use]
    pub fn shared_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub fn max_loops(mut self, max: usize) -> Self {
        self.config.max_loops = max;
        self
    }

    #[must_use]
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let store: Arc<dyn ConversationStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryConversationStore::new()),
        };

        Ok(Agent::new(
            provider,
            self.tools.unwrap_or_default(),
            store,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentBlock, Role};
    use crate::mock::ScriptedProvider;

    fn agent(provider: Arc<ScriptedProvider>) -> Agent {
        AgentBuilder::new().provider(provider).build().unwrap()
    }

    #[tokio::test]
    async fn test_call_llm_appends_user_text() {
        let provider = Arc::new(ScriptedProvider::new().respond(vec![ContentBlock::text("hi!")]));
        let agent = agent(provider.clone());
        let key = ConversationKey::from("C1:1");

        let response = agent.call_llm(&key, "  hello  ").await.unwrap();
        assert_eq!(response, LlmResponse::done("hi!"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].text(), "hello");
        assert_eq!(requests[0].options.max_tokens, 20_000);

        // user, original assistant, echo
        assert_eq!(agent.store().len(&key).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_on_empty_conversation() {
        let provider = Arc::new(ScriptedProvider::new());
        let agent = agent(provider.clone());
        let key = ConversationKey::from("C1:new");

        let response = agent.call_llm(&key, "   ").await.unwrap();
        assert_eq!(response, LlmResponse::done(DEFAULT_GUIDANCE));
        assert_eq!(provider.calls(), 0);
        assert_eq!(agent.store().len(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_uses_existing_history() {
        let provider = Arc::new(ScriptedProvider::new().respond(vec![ContentBlock::text("again")]));
        let agent = agent(provider.clone());
        let key = ConversationKey::from("C1:old");

        agent
            .store()
            .append(&key, vec![Message::user_text("earlier question")])
            .await
            .unwrap();

        agent.call_llm(&key, "").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].text(), "earlier question");
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_text() {
        let provider = Arc::new(
            ScriptedProvider::new().fail(AgentError::ProviderUnavailable("timeout".into())),
        );
        let agent = agent(provider);
        let key = ConversationKey::from("C1:err");

        let err = agent.call_llm(&key, "hello").await.unwrap_err();
        assert!(err.is_retryable());

        let history = agent.store().history(&key).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_loop_turn_sends_stored_history_and_tools() {
        let provider = Arc::new(ScriptedProvider::new().respond(vec![ContentBlock::text("ok")]));
        let agent = agent(provider.clone());
        let key = ConversationKey::from("C1:loop");

        agent
            .store()
            .append(&key, vec![Message::user_text("q"), Message::assistant_text("a")])
            .await
            .unwrap();

        agent.loop_turn(&key).await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 2);
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_lock_excludes_other_turns_on_key() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond(vec![ContentBlock::text("held")])
                .respond(vec![ContentBlock::text("other")]),
        );
        let agent = Arc::new(agent(provider.clone()));
        let key = ConversationKey::from("C1:lock");

        let turn = agent.lock(&key).await;
        let waiter = {
            let agent = agent.clone();
            let key = key.clone();
            tokio::spawn(async move { agent.call_llm(&key, "other").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.calls(), 0);

        agent.call_llm_in(&turn, "held").await.unwrap();
        assert_eq!(provider.calls(), 1);
        drop(turn);

        waiter.await.unwrap().unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
