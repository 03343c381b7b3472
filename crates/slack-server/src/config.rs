//! Server Configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use agent_tools::SqlConfig;

use crate::error::{Result, SlackError};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bot OAuth token (xoxb-...)
    pub bot_token: String,

    /// Signing secret used to verify inbound requests
    pub signing_secret: String,

    /// Listen address
    pub bind_addr: String,

    /// Database for the `sql` tool
    pub sql: SqlConfig,
}

fn required(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SlackError::Config(format!("{name} is not set")))
}

impl ServerConfig {
    /// `SLACK_BOT_TOKEN` and `SLACK_SIGNING_SECRET` are required;
    /// `BIND_ADDR` defaults to `0.0.0.0:3000`, `DATABASE_URL` to a local database
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: required("SLACK_BOT_TOKEN")?,
            signing_secret: required("SLACK_SIGNING_SECRET")?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            sql: SqlConfig::from_env(),
        })
    }
}
