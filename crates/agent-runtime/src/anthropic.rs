//! Anthropic LLM Provider
//!
//! Implementation of `LlmProvider` for the Claude Messages API.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{ContentBlock, Message, Role},
    provider::{Completion, FinishReason, LlmProvider, LlmRequest, TokenUsage},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,

    /// API root, without the `/v1/messages` suffix
    pub base_url: String,

    /// Overrides the model in the request options when set
    pub model: Option<String>,

    /// Transport timeout for a single call
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.into(),
            model: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `ANTHROPIC_API_KEY` (required), `ANTHROPIC_BASE_URL`,
    /// `ANTHROPIC_MODEL` and `ANTHROPIC_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = url;
        }
        config.model = std::env::var("ANTHROPIC_MODEL").ok();
        if let Some(secs) = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert a core request to the wire format
    fn translate_request(&self, request: &LlmRequest) -> WireRequest {
        let options = &request.options;
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| options.model.clone());

        let system = options
            .system_prompts
            .iter()
            .map(|text| WireSystemBlock {
                r#type: "text",
                text: text.clone(),
            })
            .collect();

        let tools = request
            .tools
            .iter()
            .map(|t| WireTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema(),
            })
            .collect();

        let thinking = (options.thinking_budget > 0).then(|| WireThinking {
            r#type: "enabled",
            budget_tokens: options.thinking_budget,
        });

        WireRequest {
            model,
            max_tokens: options.max_tokens,
            system,
            messages: translate_messages(&request.messages),
            tools,
            thinking,
        }
    }

    /// Convert a wire response to a core completion
    fn convert_completion(response: WireResponse) -> Completion {
        let content = response
            .content
            .into_iter()
            .filter_map(WireBlock::into_core)
            .collect();

        Completion {
            message: Message::new(Role::Assistant, content),
            model: response.model,
            usage: Some(TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            }),
            finish_reason: response.stop_reason.as_deref().map(FinishReason::from_wire),
        }
    }
}

/// Echo messages are skipped and adjacent messages of the same role merged,
/// since the API requires strictly alternating roles.
fn translate_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut out: Vec<WireMessage> = Vec::with_capacity(messages.len());

    for message in messages.iter().filter(|m| !m.echo) {
        let blocks: Vec<WireBlock> = message
            .content
            .iter()
            .filter_map(WireBlock::from_core)
            .collect();
        if blocks.is_empty() {
            continue;
        }

        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        match out.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => out.push(WireMessage {
                role,
                content: blocks,
            }),
        }
    }

    out
}

/// Map a non-success HTTP status to an agent error
fn classify_error(status: StatusCode, body: &str) -> AgentError {
    let message = serde_json::from_str::<WireErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status.as_u16() {
        401 | 403 => AgentError::Auth(message),
        429 => AgentError::RateLimited(message),
        500..=599 => AgentError::ProviderUnavailable(format!("HTTP {status}: {message}")),
        _ => AgentError::Provider(format!("HTTP {status}: {message}")),
    }
}

fn transport_error(e: &reqwest::Error) -> AgentError {
    if e.is_timeout() || e.is_connect() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Provider(format!("request failed: {e}"))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/v1/models"))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await;

        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) => {
                tracing::warn!("Anthropic health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &LlmRequest) -> Result<Completion> {
        let wire = self.translate_request(request);

        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&wire)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let parsed: WireResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::Provider(format!("failed to parse response: {e}")))?;

        Ok(Self::convert_completion(parsed))
    }
}

// Messages API wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<WireSystemBlock>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<WireThinking>,
}

#[derive(Debug, Serialize)]
struct WireSystemBlock {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct WireThinking {
    r#type: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        signature: String,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

impl WireBlock {
    /// Unsigned thinking cannot be replayed and is left out
    fn from_core(block: &ContentBlock) -> Option<Self> {
        Some(match block {
            ContentBlock::Text { text } if text.trim().is_empty() => return None,
            ContentBlock::Text { text } => Self::Text { text: text.clone() },
            ContentBlock::Thinking { thinking, signature } => Self::Thinking {
                thinking: thinking.clone(),
                signature: signature.clone()?,
            },
            ContentBlock::RedactedThinking { data } => {
                Self::RedactedThinking { data: data.clone() }
            }
            ContentBlock::ToolUse { id, name, input } => Self::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Self::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
    }

    fn into_core(self) -> Option<ContentBlock> {
        match self {
            Self::Text { text } => Some(ContentBlock::Text { text }),
            Self::Thinking {
                thinking,
                signature,
            } => Some(ContentBlock::Thinking {
                thinking,
                signature: Some(signature),
            }),
            Self::ToolUse { id, name, input } => Some(ContentBlock::ToolUse { id, name, input }),
            Self::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            }),
            Self::RedactedThinking { data } => Some(ContentBlock::RedactedThinking { data }),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: String,
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}
