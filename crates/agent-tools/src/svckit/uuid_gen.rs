//! UUID Tool

use agent_core::{Result as CoreResult, Tool, ToolSchema};
use async_trait::async_trait;

/// Tool for generating random (v4) UUIDs. Takes no input.
pub struct UuidTool;

#[async_trait]
impl Tool for UuidTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "uuid".into(),
            description: "Generate a UUID".into(),
            parameters: Vec::new(),
        }
    }

    async fn invoke(&self, _input: serde_json::Value) -> CoreResult<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}
