// src/server/chats.rs
// Chat CRUD endpoints

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::auth;
use crate::db::{self, Chat, Message};
use crate::error::{Result, TalkwireError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub company_id: String,
    #[serde(default)]
    pub user_identifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateChatResponse {
    pub chat: Chat,
    /// Bearer token scoped to this chat; required by every other endpoint
    pub token: String,
}

/// POST /api/chats
///
/// A company must have a chat config before chats can be opened for it.
pub async fn create_chat(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<CreateChatResponse>> {
    if req.company_id.trim().is_empty() {
        return Err(TalkwireError::InvalidInput("companyId is required".into()));
    }
    if state
        .cache
        .get_config(&state.pool, &req.company_id)
        .await?
        .is_none()
    {
        return Err(TalkwireError::InvalidCompany(req.company_id));
    }

    let chat = db::chats::create_chat(
        &state.pool,
        &req.company_id,
        req.user_identifier.as_deref(),
    )
    .await?;
    let token = auth::create_token(
        &state.config.jwt_secret,
        &chat.id,
        req.user_identifier.as_deref(),
    )?;

    info!(chat_id = %chat.id, company_id = %chat.company_id, "chat created");
    Ok(Json(CreateChatResponse { chat, token }))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatWithMessages {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

/// GET /api/chats/{id}
pub async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<Json<ChatWithMessages>> {
    let chat = authorize(&state, &chat_id, &headers, query.token.as_deref()).await?;
    let messages = db::messages::get_messages_by_chat_id(&state.pool, &chat.id).await?;
    Ok(Json(ChatWithMessages { chat, messages }))
}

#[derive(Debug, Deserialize)]
pub struct RenameChatRequest {
    pub title: String,
}

/// PUT /api/chats/{id}
pub async fn rename_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    Json(req): Json<RenameChatRequest>,
) -> Result<Json<Chat>> {
    if req.title.trim().is_empty() {
        return Err(TalkwireError::InvalidInput("title is required".into()));
    }
    authorize(&state, &chat_id, &headers, query.token.as_deref()).await?;

    db::chats::rename_chat(&state.pool, &chat_id, req.title.trim()).await?;
    // Invalidate before the write is acknowledged
    state.cache.invalidate_chat(&chat_id).await;

    let chat = db::chats::get_chat_by_id(&state.pool, &chat_id)
        .await?
        .ok_or_else(|| TalkwireError::ChatNotFound(chat_id))?;
    Ok(Json(chat))
}

/// DELETE /api/chats/{id}
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    authorize(&state, &chat_id, &headers, query.token.as_deref()).await?;

    db::chats::delete_chat(&state.pool, &chat_id).await?;
    state.cache.invalidate_chat(&chat_id).await;

    info!(chat_id, "chat deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Shared chat lookup plus token check. The token must be bound to this
/// chat id, not just validly signed.
pub(super) async fn authorize(
    state: &AppState,
    chat_id: &str,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Chat> {
    let chat = state
        .cache
        .get_chat(&state.pool, chat_id)
        .await?
        .ok_or_else(|| TalkwireError::ChatNotFound(chat_id.to_string()))?;

    let token = auth::extract_token(headers, query_token)?;
    auth::verify_token(&state.config.jwt_secret, &token, chat_id)?;
    Ok(chat)
}
