//! Turn Orchestration
//!
//! Drives one inbound chat event through the agent: one `call_llm`, then
//! `loop_turn` while the model keeps invoking tools, posting every
//! intermediate reply. The loop counter lives only for the duration of the
//! call, and the conversation's turn lock is held from the first call until
//! the last reply is posted.

use async_trait::async_trait;

use crate::agent::Agent;
use crate::error::Result;
use crate::store::ConversationKey;

/// Notice posted when the loop bound is hit
pub const MAX_LOOPS_NOTICE: &str = "max loops reached";

/// Destination for replies (a chat thread, a test buffer, ...)
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver one reply to the user
    async fn post(&self, text: &str) -> Result<()>;
}

/// How a conversation run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model answered without requesting more tools
    Completed,
    /// The loop bound was reached while the model still wanted tools
    MaxLoops,
    /// A model call or tool invocation failed; the error was posted
    Failed,
}

/// Summary of one conversation run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnSummary {
    /// Model calls made, including the first
    pub llm_calls: usize,
    pub outcome: RunOutcome,
}

/// Handle one user message end to end. Never returns an error: failures
/// are reported through `sink`.
pub async fn run_conversation(
    agent: &Agent,
    sink: &dyn ReplySink,
    key: &ConversationKey,
    text: &str,
) -> TurnSummary {
    let turn = agent.lock(key).await;

    let mut llm_calls = 1;
    let mut response = match agent.call_llm_in(&turn, text).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(key = %key, error = %e, "LLM call failed");
            deliver(sink, key, &e.user_message()).await;
            return TurnSummary {
                llm_calls,
                outcome: RunOutcome::Failed,
            };
        }
    };
    deliver(sink, key, &response.message).await;

    let mut loops = 0;
    while response.should_loop {
        if loops >= agent.config().max_loops {
            tracing::warn!(key = %key, loops, "Loop bound reached");
            deliver(sink, key, MAX_LOOPS_NOTICE).await;
            return TurnSummary {
                llm_calls,
                outcome: RunOutcome::MaxLoops,
            };
        }
        loops += 1;
        llm_calls += 1;

        response = match agent.loop_turn_in(&turn).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(key = %key, loops, error = %e, "LLM loop failed");
                deliver(sink, key, &e.user_message()).await;
                return TurnSummary {
                    llm_calls,
                    outcome: RunOutcome::Failed,
                };
            }
        };
        deliver(sink, key, &response.message).await;
    }

    tracing::info!(key = %key, llm_calls, "Conversation turn complete");
    TurnSummary {
        llm_calls,
        outcome: RunOutcome::Completed,
    }
}

async fn deliver(sink: &dyn ReplySink, key: &ConversationKey, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    if let Err(e) = sink.post(text).await {
        tracing::warn!(key = %key, error = %e, "Failed to post reply");
    }
}
