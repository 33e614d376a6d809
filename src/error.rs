// src/error.rs
// Standardized error types for Talkwire

use thiserror::Error;

/// Main error type for the Talkwire library
#[derive(Error, Debug)]
pub enum TalkwireError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("chat has no company: {0}")]
    InvalidChat(String),

    #[error("company config not found: {0}")]
    InvalidCompany(String),

    #[error("invalid or expired token: {0}")]
    Token(String),

    #[error("streaming error: {0}")]
    Stream(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using TalkwireError
pub type Result<T> = std::result::Result<T, TalkwireError>;

/// Error codes carried on the SSE wire in `error` events.
pub mod codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_CHAT: &str = "INVALID_CHAT";
    pub const INVALID_COMPANY: &str = "INVALID_COMPANY";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const STREAMING_ERROR: &str = "STREAMING_ERROR";
}

impl TalkwireError {
    /// Map to the wire error code sent in the SSE `error` event.
    ///
    /// Errors raised mid-stream that mention token/authentication vocabulary
    /// are remapped to `TOKEN_INVALID` so the client can prompt for session
    /// re-initialization instead of a generic retry.
    pub fn wire_code(&self) -> &'static str {
        match self {
            TalkwireError::InvalidInput(_) => codes::INVALID_REQUEST,
            TalkwireError::ChatNotFound(_) => codes::NOT_FOUND,
            TalkwireError::InvalidChat(_) => codes::INVALID_CHAT,
            TalkwireError::InvalidCompany(_) => codes::INVALID_COMPANY,
            TalkwireError::Token(_) => codes::TOKEN_INVALID,
            other => {
                let msg = other.to_string().to_lowercase();
                if msg.contains("token") || msg.contains("authenticate") {
                    codes::TOKEN_INVALID
                } else {
                    codes::STREAMING_ERROR
                }
            }
        }
    }
}

impl From<String> for TalkwireError {
    fn from(s: String) -> Self {
        TalkwireError::Stream(s)
    }
}
