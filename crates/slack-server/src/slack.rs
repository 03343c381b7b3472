//! Slack Integration
//!
//! Request signing, Events API payloads, slash-command forms and the Web
//! API client used to post replies into threads.

use std::sync::Arc;

use agent_core::{AgentError, ConversationKey, ReplySink};
use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{Result, SlackError};

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const RETRY_HEADER: &str = "x-slack-retry-num";

// ============================================================================
// Request signing
// ============================================================================

/// Verifies `X-Slack-Signature` against the app's signing secret
pub struct SignatureVerifier {
    secret: String,
    max_skew_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            max_skew_secs: 5 * 60,
        }
    }

    /// Verify a request against the current clock
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        let timestamp = header(headers, TIMESTAMP_HEADER)?;
        let signature = header(headers, SIGNATURE_HEADER)?;
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, timestamp: &str, signature: &str, body: &[u8], now: i64) -> Result<()> {
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| SlackError::InvalidSignature("timestamp is not a number".into()))?;
        if (now - ts).abs() > self.max_skew_secs {
            return Err(SlackError::StaleRequest);
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or_else(|| SlackError::InvalidSignature("malformed signature".into()))?;

        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| SlackError::InvalidSignature("signature mismatch".into()))
    }

    /// `v0=` + hex HMAC-SHA256 over `v0:<timestamp>:<body>`
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("v0={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SlackError::Config(format!("invalid signing secret: {e}")))?;
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SlackError::MissingHeader(name))
}

// ============================================================================
// Events API
// ============================================================================

/// Outer envelope of an Events API request
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: SlackEvent,
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// The inner `event` of an `event_callback`
#[derive(Debug, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    pub channel: Option<String>,
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

/// Where to reply and which conversation the event belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadRef {
    pub channel: String,
    pub thread_ts: String,
}

impl ThreadRef {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::thread(&self.channel, &self.thread_ts)
    }
}

impl SlackEvent {
    /// Thread to answer in, or `None` if the bot should stay silent.
    ///
    /// Channel messages arrive both as `message` and `app_mention`; only the
    /// mention is answered there. Direct messages are answered as `message`.
    pub fn reply_target(&self) -> Option<ThreadRef> {
        if self.bot_id.is_some() || self.subtype.is_some() {
            return None;
        }

        let addressed = match self.kind.as_str() {
            "app_mention" => true,
            "message" => self.channel_type.as_deref() == Some("im"),
            _ => false,
        };
        if !addressed {
            return None;
        }

        Some(ThreadRef {
            channel: self.channel.clone()?,
            thread_ts: self.thread_ts.clone().or_else(|| self.ts.clone())?,
        })
    }
}

/// Remove `<@U123>` mention tokens and surrounding whitespace
pub fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Slash commands
// ============================================================================

/// The fields of a slash-command form this server reads
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

impl SlashCommand {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut cmd = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "command" => cmd.command = value.into_owned(),
                "text" => cmd.text = value.into_owned(),
                "user_id" => cmd.user_id = value.into_owned(),
                "channel_id" => cmd.channel_id = value.into_owned(),
                _ => {}
            }
        }

        if cmd.command.is_empty() {
            return Err(SlackError::BadPayload("missing command".into()));
        }
        Ok(cmd)
    }
}

// ============================================================================
// Web API client
// ============================================================================

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Minimal Slack Web API client
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub const DEFAULT_API_BASE: &'static str = "https://slack.com/api";

    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token: token.into(),
            api_base: Self::DEFAULT_API_BASE.into(),
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// `chat.postMessage` into a thread
    pub async fn post_message(&self, thread: &ThreadRef, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "channel": thread.channel,
            "thread_ts": thread.thread_ts,
            "text": text,
        });

        let response: ApiResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(SlackError::Api(
                response.error.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }
}

/// Replies for one conversation, posted into its thread
pub struct ThreadSink {
    client: Arc<SlackClient>,
    thread: ThreadRef,
}

impl ThreadSink {
    pub const fn new(client: Arc<SlackClient>, thread: ThreadRef) -> Self {
        Self { client, thread }
    }
}

#[async_trait]
impl ReplySink for ThreadSink {
    async fn post(&self, text: &str) -> agent_core::Result<()> {
        self.client
            .post_message(&self.thread, text)
            .await
            .map_err(|e| {
                tracing::debug!(
                    channel = %self.thread.channel,
                    retryable = e.is_retryable(),
                    "chat.postMessage failed"
                );
                AgentError::Other(e.to_string())
            })
    }
}
