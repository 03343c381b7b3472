//! Base64 Tool
//!
//! Encodes text with the standard alphabet and padding.

use agent_core::{
    Result as CoreResult, Tool, ToolSchema, parse_input,
    tool::ParameterSchema,
};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Tool for base64-encoding text
pub struct Base64Tool;

#[derive(Deserialize)]
struct Base64Input {
    text: String,
}

#[async_trait]
impl Tool for Base64Tool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "base64".into(),
            description: "Base64 encode a string".into(),
            parameters: vec![ParameterSchema::string("text", "The text to encode")],
        }
    }

    async fn invoke(&self, input: serde_json::Value) -> CoreResult<String> {
        let input: Base64Input = parse_input("base64", input)?;
        Ok(STANDARD.encode(input.text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentError;
    use serde_json::json;

    #[tokio::test]
    async fn test_encodes_with_padding() {
        let out = Base64Tool.invoke(json!({"text": "hello"})).await.unwrap();
        assert_eq!(out, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_empty_text() {
        let out = Base64Tool.invoke(json!({"text": ""})).await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_output_decodes_to_input() {
        for text in ["", "a", "hello", "héllo 日本 🦀", "line one\nline two\t!"] {
            let out = Base64Tool.invoke(json!({ "text": text })).await.unwrap();
            let decoded = STANDARD.decode(&out).unwrap();
            assert_eq!(String::from_utf8(decoded).unwrap(), text);
        }
    }

    #[tokio::test]
    async fn test_missing_text_is_invalid_input() {
        let err = Base64Tool.invoke(json!({"txt": "hello"})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput { .. }));
    }
}
