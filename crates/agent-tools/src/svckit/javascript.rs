//! JavaScript Tool
//!
//! Evaluates a script in a fresh QuickJS runtime per invocation and returns
//! the value of its final expression. Nothing survives between calls.

use std::time::{Duration, Instant};

use agent_core::{
    AgentError, Result as CoreResult, Tool, ToolSchema, parse_input,
    tool::ParameterSchema,
};
use async_trait::async_trait;
use rquickjs::{CatchResultExt, CaughtError, Context, Runtime, convert::Coerced};
use serde::Deserialize;

/// Resource limits applied to every evaluation
#[derive(Clone, Copy, Debug)]
pub struct JavaScriptLimits {
    /// Heap limit for the runtime
    pub memory_bytes: usize,
    /// Maximum interpreter stack
    pub stack_bytes: usize,
    /// Wall-clock budget; the script is interrupted once it elapses
    pub timeout: Duration,
}

impl Default for JavaScriptLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 32 * 1024 * 1024,
            stack_bytes: 512 * 1024,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Tool for running JavaScript in an isolated interpreter
#[derive(Default)]
pub struct JavaScriptTool {
    limits: JavaScriptLimits,
}

impl JavaScriptTool {
    pub const fn new(limits: JavaScriptLimits) -> Self {
        Self { limits }
    }
}

#[derive(Deserialize)]
struct JavaScriptInput {
    code: String,
}

fn evaluate(code: &str, limits: JavaScriptLimits) -> CoreResult<String> {
    let runtime = Runtime::new().map_err(|e| {
        AgentError::ToolExecution(format!("failed to create JavaScript runtime: {e}"))
    })?;
    runtime.set_memory_limit(limits.memory_bytes);
    runtime.set_max_stack_size(limits.stack_bytes);

    let deadline = Instant::now() + limits.timeout;
    runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

    let context = Context::full(&runtime).map_err(|e| {
        AgentError::ToolExecution(format!("failed to create JavaScript context: {e}"))
    })?;

    let output = context.with(|ctx| {
        match ctx.eval::<Coerced<String>, _>(code).catch(&ctx) {
            Ok(Coerced(value)) => value,
            Err(_) if Instant::now() >= deadline => format!(
                "Error: script interrupted after {}ms",
                limits.timeout.as_millis()
            ),
            Err(e) => {
                let message = match &e {
                    CaughtError::Exception(ex) => ex.message(),
                    _ => None,
                };
                format!("Error: {}", message.unwrap_or_else(|| e.to_string()))
            }
        }
    });

    Ok(output)
}

#[async_trait]
impl Tool for JavaScriptTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "quickjs".into(),
            description: "Run a JavaScript function. The value of the last expression is returned; console output is discarded.".into(),
            parameters: vec![ParameterSchema::string("code", "The JavaScript code to run")],
        }
    }

    async fn invoke(&self, input: serde_json::Value) -> CoreResult<String> {
        let input: JavaScriptInput = parse_input("quickjs", input)?;
        let limits = self.limits;

        tokio::task::spawn_blocking(move || evaluate(&input.code, limits))
            .await
            .map_err(|e| AgentError::ToolExecution(format!("JavaScript worker failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(code: &str) -> String {
        JavaScriptTool::default()
            .invoke(json!({ "code": code }))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_final_expression_value() {
        assert_eq!(run("2+2").await, "4");
        assert_eq!(run("const xs = [1, 2, 3]; xs.map(x => x * 2).join(',')").await, "2,4,6");
        assert_eq!(run("JSON.stringify({a: 1})").await, r#"{"a":1}"#);

        let out = run("console.log('hi'); 'done'").await;
        assert!(out.starts_with("Error: ") && out.contains("console"));
    }

    #[tokio::test]
    async fn test_exception_is_domain_error() {
        assert_eq!(run("throw new Error('boom')").await, "Error: boom");
        assert!(run("let = ;").await.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_no_state_between_invocations() {
        assert_eq!(run("var leaked = 1; leaked").await, "1");
        assert_eq!(run("typeof leaked").await, "undefined");
    }

    #[tokio::test]
    async fn test_infinite_loop_is_interrupted() {
        let tool = JavaScriptTool::new(JavaScriptLimits {
            timeout: Duration::from_millis(100),
            ..JavaScriptLimits::default()
        });

        let out = tool.invoke(json!({"code": "while (true) {}"})).await.unwrap();
        assert_eq!(out, "Error: script interrupted after 100ms");
    }

    #[tokio::test]
    async fn test_memory_limit() {
        let tool = JavaScriptTool::new(JavaScriptLimits {
            memory_bytes: 4 * 1024 * 1024,
            ..JavaScriptLimits::default()
        });

        let out = tool
            .invoke(json!({"code": "const a = []; while (true) { a.push(new Array(100000).fill(1)); }"}))
            .await
            .unwrap();
        assert!(out.starts_with("Error: "));
    }
}
