//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use agent_core::{Tool, run_conversation};
use agent_tools::{
    decode_claims,
    tools::{Base64Tool, UuidTool},
};

use crate::error::{Result, SlackError};
use crate::slack::{
    EventEnvelope, RETRY_HEADER, SlashCommand, ThreadRef, ThreadSink, strip_mentions,
};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tools: Vec<String>,
}

/// Immediate reply to a slash command
#[derive(Debug, Serialize)]
pub struct SlashResponse {
    pub text: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tools: state
            .agent
            .tools()
            .names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Slack Events API endpoint.
///
/// Slack expects an answer within three seconds, so conversations run on a
/// spawned task and the request is acknowledged right away.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    state.verifier.verify(&headers, &body)?;

    let envelope: EventEnvelope =
        serde_json::from_slice(&body).map_err(|e| SlackError::BadPayload(e.to_string()))?;

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            Ok(Json(serde_json::json!({ "challenge": challenge })).into_response())
        }
        EventEnvelope::EventCallback { event, event_id } => {
            if let Some(retry) = headers.get(RETRY_HEADER) {
                tracing::debug!(event_id = ?event_id, retry = ?retry, "Ignoring Slack retry");
                return Ok(StatusCode::OK.into_response());
            }

            match event.reply_target() {
                Some(thread) => {
                    tracing::info!(
                        event_id = ?event_id,
                        kind = %event.kind,
                        user = ?event.user,
                        key = %thread.key(),
                        "Handling event"
                    );
                    spawn_conversation(&state, thread, strip_mentions(&event.text));
                }
                None => tracing::debug!(event_id = ?event_id, kind = %event.kind, "Ignoring event"),
            }
            Ok(StatusCode::OK.into_response())
        }
        EventEnvelope::Unsupported => Ok(StatusCode::OK.into_response()),
    }
}

fn spawn_conversation(state: &AppState, thread: ThreadRef, text: String) {
    let agent = state.agent.clone();
    let key = thread.key();
    let sink = ThreadSink::new(state.slack.clone(), thread);

    tokio::spawn(async move {
        let summary = run_conversation(&agent, &sink, &key, &text).await;
        tracing::info!(
            key = %key,
            llm_calls = summary.llm_calls,
            outcome = ?summary.outcome,
            "Event handled"
        );
    });
}

/// Slash commands
pub async fn slash_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SlashResponse>> {
    state.verifier.verify(&headers, &body)?;
    let cmd = SlashCommand::parse(&body)?;

    tracing::info!(command = %cmd.command, user = %cmd.user_id, channel = %cmd.channel_id, "Slash command");

    let text = match cmd.command.as_str() {
        "/echo" => cmd.text,
        "/b64" => Base64Tool
            .invoke(serde_json::json!({ "text": cmd.text }))
            .await
            .map_err(|e| SlackError::BadPayload(e.to_string()))?,
        "/sha256" => hex::encode(Sha256::digest(cmd.text.as_bytes())),
        "/jwtdecode" => decode_claims(&cmd.text).unwrap_or_else(|e| format!("Error: {e}")),
        "/uuid" => UuidTool
            .invoke(serde_json::Value::Null)
            .await
            .map_err(|e| SlackError::BadPayload(e.to_string()))?,
        other => return Err(SlackError::UnknownCommand(other.to_string())),
    };

    Ok(Json(SlashResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::{SIGNATURE_HEADER, SignatureVerifier, SlackClient, TIMESTAMP_HEADER};
    use agent_core::{
        AgentBuilder, ContentBlock, ConversationKey, ConversationStore, mock::ScriptedProvider,
    };
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "test-signing-secret";

    fn state(provider: Arc<ScriptedProvider>) -> AppState {
        let agent = AgentBuilder::new().provider(provider).build().unwrap();
        let slack = SlackClient::new("xoxb-test")
            .unwrap()
            .with_api_base("http://127.0.0.1:1");
        AppState::new(agent, slack, SignatureVerifier::new(SECRET))
    }

    fn signed(uri: &str, body: &str) -> axum::http::request::Builder {
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = SignatureVerifier::new(SECRET)
            .sign(&ts, body.as_bytes())
            .unwrap();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(TIMESTAMP_HEADER, ts)
            .header(SIGNATURE_HEADER, sig)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn slash(state: AppState, form: &str) -> Response {
        crate::router(state)
            .oneshot(signed("/slash", form).body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = crate::router(state(Arc::new(ScriptedProvider::new())));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["tools"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_url_verification() {
        let payload = r#"{"type":"url_verification","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"}"#;
        let response = crate::router(state(Arc::new(ScriptedProvider::new())))
            .oneshot(signed("/slack/events", payload).body(Body::from(payload)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["challenge"],
            "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        );
    }

    #[tokio::test]
    async fn test_unsigned_request_rejected() {
        let response = crate::router(state(Arc::new(ScriptedProvider::new())))
            .oneshot(
                Request::post("/slack/events")
                    .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mention_runs_conversation() {
        let provider = Arc::new(ScriptedProvider::new().respond(vec![ContentBlock::text("4")]));
        let state = state(provider.clone());
        let agent = state.agent.clone();

        let payload = r#"{"type":"event_callback","event_id":"Ev1","event":{"type":"app_mention","text":"<@U0BOT> what is 2+2?","channel":"C1","user":"U1","ts":"1.1"}}"#;
        let response = crate::router(state)
            .oneshot(signed("/slack/events", payload).body(Body::from(payload)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for _ in 0..100 {
            if provider.calls() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.requests()[0].messages[0].text(), "what is 2+2?");

        let key = ConversationKey::from("C1:1.1");
        for _ in 0..100 {
            if agent.store().len(&key).await.unwrap() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(agent.store().len(&key).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_is_acknowledged_without_work() {
        let provider = Arc::new(ScriptedProvider::new());
        let payload = r#"{"type":"event_callback","event":{"type":"app_mention","text":"hi","channel":"C1","ts":"1.1"}}"#;

        let response = crate::router(state(provider.clone()))
            .oneshot(
                signed("/slack/events", payload)
                    .header(RETRY_HEADER, "1")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_slash_commands() {
        let provider = Arc::new(ScriptedProvider::new());

        let response = slash(state(provider.clone()), "command=%2Fb64&text=hello").await;
        assert_eq!(json_body(response).await["text"], "aGVsbG8=");

        let response = slash(state(provider.clone()), "command=%2Fsha256&text=abc").await;
        assert_eq!(
            json_body(response).await["text"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let response = slash(state(provider.clone()), "command=%2Fecho&text=hi+there").await;
        assert_eq!(json_body(response).await["text"], "hi there");

        let response = slash(state(provider.clone()), "command=%2Fjwtdecode&text=nope").await;
        let text = json_body(response).await["text"].as_str().unwrap().to_string();
        assert!(text.starts_with("Error: "));

        let response = slash(state(provider), "command=%2Fuuid").await;
        let text = json_body(response).await["text"].as_str().unwrap().to_string();
        assert_eq!(text.len(), 36);
    }

    #[tokio::test]
    async fn test_unknown_slash_command() {
        let response = slash(state(Arc::new(ScriptedProvider::new())), "command=%2Fteleport").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
