//! Conversation Store
//!
//! Per-conversation, append-only message history.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::message::{Message, Role};

/// Identifier under which a conversation's history is grouped
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Key for a chat thread: `<channel>:<thread_ts>`
    pub fn thread(channel: &str, thread_ts: &str) -> Self {
        Self(format!("{channel}:{thread_ts}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Conversation store trait
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append messages, in order, to the conversation for `key`
    async fn append(&self, key: &ConversationKey, messages: Vec<Message>) -> Result<()>;

    /// Full history for `key` (empty if the conversation does not exist)
    async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>>;

    /// Number of stored messages for `key`
    async fn len(&self, key: &ConversationKey) -> Result<usize> {
        Ok(self.history(key).await?.len())
    }

    /// Keys of every known conversation
    async fn keys(&self) -> Result<Vec<ConversationKey>>;
}

type History = Arc<Mutex<Vec<Message>>>;

/// In-memory conversation store
///
/// Each conversation has its own mutex: concurrent appends to one key are
/// serialized, different keys never contend beyond the brief map lookup.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationKey, History>>,
    max_messages: Option<usize>,
}

impl MemoryConversationStore {
    /// Store with unbounded retention
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps at most `max` messages per conversation
    pub fn with_max_messages(max: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_messages: Some(max),
        }
    }

    async fn conversation(&self, key: &ConversationKey) -> History {
        if let Some(history) = self.conversations.read().await.get(key) {
            return history.clone();
        }

        self.conversations
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

/// Drop the oldest messages until at most `max` remain, then keep dropping
/// until the history starts at a plain user message so no tool result is
/// left without the tool use it answers.
fn enforce_retention(messages: &mut Vec<Message>, max: usize) {
    if messages.len() <= max {
        return;
    }

    let mut start = messages.len() - max;
    while start < messages.len() {
        let m = &messages[start];
        if m.role == Role::User && !m.has_tool_result() {
            break;
        }
        start += 1;
    }

    messages.drain(..start);
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append(&self, key: &ConversationKey, messages: Vec<Message>) -> Result<()> {
        let history = self.conversation(key).await;
        let mut history = history.lock().await;

        history.extend(messages);
        if let Some(max) = self.max_messages {
            enforce_retention(&mut history, max);
        }

        tracing::trace!(key = %key, len = history.len(), "Appended to conversation");
        Ok(())
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let existing = self.conversations.read().await.get(key).cloned();
        match existing {
            Some(history) => Ok(history.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn len(&self, key: &ConversationKey) -> Result<usize> {
        let existing = self.conversations.read().await.get(key).cloned();
        match existing {
            Some(history) => Ok(history.lock().await.len()),
            None => Ok(0),
        }
    }

    async fn keys(&self) -> Result<Vec<ConversationKey>> {
        let mut keys: Vec<_> = self.conversations.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
