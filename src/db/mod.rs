// src/db/mod.rs
// SQLite persistence: chats, messages, per-company chat configs

pub mod chat_configs;
pub mod chats;
pub mod messages;

pub use chat_configs::ChatConfig;
pub use chats::Chat;
pub use messages::Message;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::Result;

/// Create the SQLite connection pool, creating the database file if it does
/// not exist yet.
///
/// SQLite is single-writer with multiple readers, so the pool stays small
/// and recycles connections periodically.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .max_lifetime(Duration::from_secs(1800))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Apply the schema. Idempotent, runs at every startup.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            company_id TEXT NOT NULL,
            title TEXT,
            user_identifier TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id TEXT,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(chat_id, sequence_number)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_chat_seq
            ON messages(chat_id, sequence_number);

        CREATE TABLE IF NOT EXISTS chat_configs (
            company_id TEXT PRIMARY KEY,
            system_prompt TEXT,
            model TEXT,
            temperature REAL,
            enable_email_function INTEGER NOT NULL DEFAULT 0,
            timezone TEXT,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    info!("database schema ready");
    Ok(())
}

pub(crate) fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_creates_missing_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talkwire.db");
        let url = format!("sqlite://{}", path.display());

        let pool = create_pool(&url).await.unwrap();
        init_schema(&pool).await.unwrap();
        assert!(path.exists());

        pool.close().await;
    }
}
