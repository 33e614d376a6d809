// src/auth/mod.rs
// Chat-scoped bearer tokens

use axum::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TalkwireError};

/// Token claims. A token is scoped to one chat: possession of the chat id
/// alone is not enough to read or stream it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user identifier, or "anonymous"
    pub chat_id: String,
    pub exp: usize,
    pub iat: usize,
}

const TOKEN_TTL_DAYS: i64 = 30;

pub fn create_token(secret: &str, chat_id: &str, user_identifier: Option<&str>) -> Result<String> {
    let now = chrono::Utc::now();
    let expiration = now
        .checked_add_signed(chrono::Duration::days(TOKEN_TTL_DAYS))
        .ok_or_else(|| TalkwireError::Token("failed to compute token expiry".into()))?;

    let claims = Claims {
        sub: user_identifier.unwrap_or("anonymous").to_string(),
        chat_id: chat_id.to_string(),
        exp: expiration.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TalkwireError::Token(format!("failed to sign token: {e}")))
}

/// Verify signature and expiry, then check the chat binding.
pub fn verify_token(secret: &str, token: &str, chat_id: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| TalkwireError::Token(format!("invalid token: {e}")))?;

    if data.claims.chat_id != chat_id {
        return Err(TalkwireError::Token(
            "token is not valid for this chat".into(),
        ));
    }
    Ok(data.claims)
}

/// Pull the bearer token from the Authorization header, falling back to a
/// `token` query parameter (EventSource cannot set request headers).
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
        && !token.is_empty()
    {
        return Ok(token.to_string());
    }
    if let Some(token) = query_token
        && !token.is_empty()
    {
        return Ok(token.to_string());
    }
    Err(TalkwireError::Token("missing bearer token".into()))
}
