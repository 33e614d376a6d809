// src/db/messages.rs
// Message rows ordered by an explicit per-chat sequence number

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::now_ts;
use crate::error::Result;

/// Maps directly to the `messages` table.
///
/// `sequence_number` is the sole ordering authority. Sequences start at 1;
/// created_at is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Who authored the message; None for assistant and system rows
    pub user_id: Option<String>,
    pub role: String,
    pub content: String,
    pub sequence_number: i64,
    pub created_at: i64,
}

pub async fn create_message(
    pool: &SqlitePool,
    chat_id: &str,
    user_id: Option<&str>,
    role: &str,
    content: &str,
    sequence_number: i64,
) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        user_id: user_id.map(String::from),
        role: role.to_string(),
        content: content.to_string(),
        sequence_number,
        created_at: now_ts(),
    };

    sqlx::query(
        "INSERT INTO messages (id, chat_id, user_id, role, content, sequence_number, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.chat_id)
    .bind(&message.user_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.sequence_number)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// All messages for a chat, ascending by sequence number
pub async fn get_messages_by_chat_id(pool: &SqlitePool, chat_id: &str) -> Result<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE chat_id = ? ORDER BY sequence_number ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

/// Highest sequence number in the chat, 0 when the chat is empty
pub async fn get_latest_sequence_number(pool: &SqlitePool, chat_id: &str) -> Result<i64> {
    let latest: Option<(i64,)> = sqlx::query_as(
        "SELECT sequence_number FROM messages
         WHERE chat_id = ? ORDER BY sequence_number DESC LIMIT 1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    Ok(latest.map(|(n,)| n).unwrap_or(0))
}
