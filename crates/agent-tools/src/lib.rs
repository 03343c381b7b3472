//! # agent-tools
//!
//! Built-in capabilities advertised to the model.
//!
//! | tool        | input                 | result                               |
//! |-------------|-----------------------|--------------------------------------|
//! | `base64`    | `{text}`              | standard base64 with padding         |
//! | `jwtdecode` | `{token}`             | one `Key: .., value: ..` line per claim |
//! | `uuid`      | none                  | random v4 UUID                       |
//! | `quickjs`   | `{code}`              | final expression value as a string   |
//! | `sql`       | `{query, params?}`    | rows as a JSON array                 |
//!
//! Domain failures (a thrown exception, a bad query, a malformed token)
//! come back as `Error: ...` text so the model can correct itself.

pub mod svckit;

use agent_core::{Result, ToolRegistry};

pub use svckit::{JavaScriptLimits, SqlConfig, decode_claims};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        Base64Tool,
        JavaScriptTool,
        JwtDecodeTool,
        SqlTool,
        UuidTool,
    };
}

/// Register every built-in tool, in the order they are advertised
pub fn register_builtin(registry: &mut ToolRegistry, sql: SqlConfig) -> Result<()> {
    registry.register(tools::Base64Tool)?;
    registry.register(tools::JwtDecodeTool)?;
    registry.register(tools::UuidTool)?;
    registry.register(tools::JavaScriptTool::default())?;
    registry.register(tools::SqlTool::new(sql)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::mock::ScriptedProvider;
    use agent_core::{
        AgentBuilder, ContentBlock, ConversationKey, ReplySink, RunOutcome, run_conversation,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Transcript(Mutex<Vec<String>>);

    #[async_trait]
    impl ReplySink for Transcript {
        async fn post(&self, text: &str) -> Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_builtin() {
        let mut registry = ToolRegistry::new();
        register_builtin(&mut registry, SqlConfig::default()).unwrap();

        assert_eq!(
            registry.names(),
            vec!["base64", "jwtdecode", "uuid", "quickjs", "sql"]
        );
    }

    #[tokio::test]
    async fn test_two_plus_two_through_builtin_quickjs() {
        let mut registry = ToolRegistry::new();
        register_builtin(&mut registry, SqlConfig::default()).unwrap();

        let provider = Arc::new(
            ScriptedProvider::new()
                .respond(vec![ContentBlock::tool_use(
                    "toolu_1",
                    "quickjs",
                    serde_json::json!({"code": "2+2"}),
                )])
                .respond(vec![ContentBlock::text("2+2 is 4")]),
        );
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .tools(registry)
            .build()
            .unwrap();
        let transcript = Transcript::default();

        let summary = run_conversation(
            &agent,
            &transcript,
            &ConversationKey::from("C1:1"),
            "what is 2+2 in js",
        )
        .await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.llm_calls, 2);
        assert_eq!(
            *transcript.0.lock().unwrap(),
            vec!["quickjs: \n4", "2+2 is 4"]
        );
        assert_eq!(provider.requests()[1].tools.len(), 5);
    }
}
