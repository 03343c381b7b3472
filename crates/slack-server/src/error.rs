//! Server Error Types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SlackError>;

/// Slack-facing errors
#[derive(Error, Debug)]
pub enum SlackError {
    /// A required request header is absent or not ASCII
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// Request signature does not match the signing secret
    #[error("Signature invalid: {0}")]
    InvalidSignature(String),

    /// Request timestamp is too far from the server clock
    #[error("Request timestamp outside the accepted window")]
    StaleRequest,

    /// Request body could not be parsed
    #[error("Bad payload: {0}")]
    BadPayload(String),

    /// Slash command this server does not implement
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Slack Web API answered `ok: false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// Transport failure talking to Slack
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SlackError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::MissingHeader(_) | Self::InvalidSignature(_) | Self::StaleRequest => {
                "Request could not be verified."
            }
            Self::BadPayload(_) => "Request could not be understood.",
            Self::UnknownCommand(_) => "Unknown command.",
            Self::Api(_) | Self::Http(_) => "Slack could not be reached.",
            Self::Config(_) => "Service configuration error.",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::InvalidSignature(_) | Self::StaleRequest => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadPayload(_) | Self::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            Self::Api(_) | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SlackError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = serde_json::json!({ "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SlackError::StaleRequest.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            SlackError::UnknownCommand("/nope".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert!(!SlackError::Api("channel_not_found".into()).is_retryable());
    }
}
