//! Slack agent HTTP server
//!
//! Axum-based server exposing the Slack Events API endpoint, slash
//! commands and a health check. Mentions and direct messages are handed
//! to the agent; replies are posted back into the originating thread.

mod config;
mod error;
mod handlers;
mod slack;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{AgentBuilder, LlmProvider, ToolRegistry};
use agent_runtime::AnthropicProvider;

use crate::config::ServerConfig;
use crate::handlers::{health_check, slack_events, slash_command};
use crate::slack::{SignatureVerifier, SlackClient};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/slack/events", post(slack_events))
        .route("/slash", post(slash_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider = std::sync::Arc::new(AnthropicProvider::from_env()?);
    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to {}", provider.name()),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not reachable - replies will fail", provider.name());
            tracing::warn!("  Check ANTHROPIC_API_KEY and ANTHROPIC_BASE_URL");
        }
    }

    // Initialize tools
    let mut tools = ToolRegistry::new();
    agent_tools::register_builtin(&mut tools, config.sql.clone())?;

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = AgentBuilder::new().provider(provider).tools(tools).build()?;

    // Build application state
    let state = AppState::new(
        agent,
        SlackClient::new(&config.bot_token)?,
        SignatureVerifier::new(&config.signing_secret),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("slack-server listening on http://{}", config.bind_addr);
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  POST /slack/events - Slack Events API");
    tracing::info!("  POST /slash        - Slash commands");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
