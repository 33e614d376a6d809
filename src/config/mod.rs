// src/config/mod.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::info;

use crate::error::{Result, TalkwireError};

/// Server configuration loaded from the environment.
///
/// Every external collaborator (model provider, email delivery, vector
/// retrieval) is configured here and constructed once at startup; nothing
/// reads the environment after boot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host (TALKWIRE_HOST, default 127.0.0.1)
    pub host: String,
    /// Bind port (TALKWIRE_PORT, default 3000)
    pub port: u16,
    /// SQLite database URL (DATABASE_URL, default sqlite://talkwire.db)
    pub database_url: String,
    /// Secret for chat access tokens (TALKWIRE_JWT_SECRET)
    pub jwt_secret: String,
    /// Model provider API key (OPENAI_API_KEY)
    pub openai_api_key: String,
    /// Model provider base URL (OPENAI_BASE_URL)
    pub openai_base_url: String,
    /// Email delivery API endpoint (EMAIL_API_URL), optional
    pub email_api_url: Option<String>,
    /// Email delivery API key (EMAIL_API_KEY), optional
    pub email_api_key: Option<String>,
    /// Vector retrieval service URL (RETRIEVAL_API_URL), optional
    pub retrieval_api_url: Option<String>,
    /// Vector retrieval API key (RETRIEVAL_API_KEY), optional
    pub retrieval_api_key: Option<String>,
}

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = read_var("OPENAI_API_KEY")
            .ok_or_else(|| TalkwireError::Config("OPENAI_API_KEY is not set".into()))?;
        let jwt_secret = read_var("TALKWIRE_JWT_SECRET")
            .ok_or_else(|| TalkwireError::Config("TALKWIRE_JWT_SECRET is not set".into()))?;

        let port = match read_var("TALKWIRE_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| TalkwireError::Config(format!("invalid TALKWIRE_PORT: {raw}")))?,
            None => 3000,
        };

        let config = Self {
            host: read_var("TALKWIRE_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port,
            database_url: read_var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://talkwire.db".into()),
            jwt_secret,
            openai_api_key,
            openai_base_url: read_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            email_api_url: read_var("EMAIL_API_URL"),
            email_api_key: read_var("EMAIL_API_KEY"),
            retrieval_api_url: read_var("RETRIEVAL_API_URL"),
            retrieval_api_key: read_var("RETRIEVAL_API_KEY"),
        };
        config.log_status();
        Ok(config)
    }

    /// Log which optional collaborators are configured (without exposing values)
    fn log_status(&self) {
        let mut available = vec!["model provider"];
        if self.email_api_url.is_some() {
            available.push("email delivery");
        }
        if self.retrieval_api_url.is_some() {
            available.push("document retrieval");
        }
        info!("Configured collaborators: {}", available.join(", "));
    }
}

/// Read a single env var, filtering empty values
fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
