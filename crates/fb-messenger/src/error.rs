//! Error types for fb-messenger

use thiserror::Error;

/// fb-messenger error type
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Facebook page access token not set")]
    AccessTokenNotSet,

    #[error("Graph API request failed: {0}")]
    Request(String),

    #[error("Graph API returned a non-JSON response (status {status}): {message}")]
    Decode { status: u16, message: String },

    #[error("Graph API error {code}: {message}")]
    Graph {
        code: i64,
        kind: Option<String>,
        message: String,
    },

    #[error("Graph API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown sender action: {0}")]
    InvalidSenderAction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Serialization(String),

    #[error("Webhook server error: {0}")]
    Server(String),
}

impl From<reqwest::Error> for MessengerError {
    fn from(err: reqwest::Error) -> Self {
        MessengerError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for MessengerError {
    fn from(err: serde_json::Error) -> Self {
        MessengerError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MessengerError>;
