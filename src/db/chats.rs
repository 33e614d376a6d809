// src/db/chats.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::now_ts;
use crate::error::Result;

/// Maps directly to the `chats` table
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub id: String,
    pub company_id: String,
    pub title: Option<String>,
    pub user_identifier: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn create_chat(
    pool: &SqlitePool,
    company_id: &str,
    user_identifier: Option<&str>,
) -> Result<Chat> {
    let now = now_ts();
    let chat = Chat {
        id: Uuid::new_v4().to_string(),
        company_id: company_id.to_string(),
        title: None,
        user_identifier: user_identifier.map(String::from),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO chats (id, company_id, title, user_identifier, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&chat.id)
    .bind(&chat.company_id)
    .bind(&chat.title)
    .bind(&chat.user_identifier)
    .bind(chat.created_at)
    .bind(chat.updated_at)
    .execute(pool)
    .await?;

    Ok(chat)
}

/// Rename a chat. Returns whether the chat existed.
pub async fn rename_chat(pool: &SqlitePool, chat_id: &str, title: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE chats SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(now_ts())
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_chat_by_id(pool: &SqlitePool, chat_id: &str) -> Result<Option<Chat>> {
    let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;
    Ok(chat)
}

/// Bump updated_at, typically after a new message lands
pub async fn touch_chat(pool: &SqlitePool, chat_id: &str) -> Result<()> {
    sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
        .bind(now_ts())
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a chat and its messages. Returns whether a row was removed.
pub async fn delete_chat(pool: &SqlitePool, chat_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM chats WHERE id = ?")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
