//! Application State

use std::sync::Arc;

use agent_core::Agent;

use crate::slack::{SignatureVerifier, SlackClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Agent driving every conversation
    pub agent: Arc<Agent>,

    /// Web API client for posting replies
    pub slack: Arc<SlackClient>,

    /// Inbound request verification
    pub verifier: Arc<SignatureVerifier>,
}

impl AppState {
    pub fn new(agent: Agent, slack: SlackClient, verifier: SignatureVerifier) -> Self {
        Self {
            agent: Arc::new(agent),
            slack: Arc::new(slack),
            verifier: Arc::new(verifier),
        }
    }
}
