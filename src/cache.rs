// src/cache.rs
// Read-through caches in front of the chats and chat_configs tables

use moka::future::Cache;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::{self, Chat, ChatConfig};
use crate::error::Result;

const CHAT_CACHE_CAPACITY: u64 = 10_000;
const CONFIG_CACHE_CAPACITY: u64 = 1_000;

/// Caches chat rows by id and chat configs by company.
///
/// Entries never expire on their own; capacity eviction and explicit
/// invalidation are the only ways out. Negative results are not cached, so
/// a chat created elsewhere becomes visible on the next lookup. Writers
/// must invalidate.
#[derive(Clone)]
pub struct StoreCache {
    chats: Cache<String, Chat>,
    configs: Cache<String, ChatConfig>,
}

impl StoreCache {
    pub fn new() -> Self {
        Self {
            chats: Cache::builder().max_capacity(CHAT_CACHE_CAPACITY).build(),
            configs: Cache::builder()
                .max_capacity(CONFIG_CACHE_CAPACITY)
                .build(),
        }
    }

    pub async fn get_chat(&self, pool: &SqlitePool, chat_id: &str) -> Result<Option<Chat>> {
        if let Some(chat) = self.chats.get(chat_id).await {
            debug!(chat_id, "chat cache hit");
            return Ok(Some(chat));
        }
        let chat = db::chats::get_chat_by_id(pool, chat_id).await?;
        if let Some(chat) = &chat {
            self.chats.insert(chat_id.to_string(), chat.clone()).await;
        }
        Ok(chat)
    }

    pub async fn get_config(
        &self,
        pool: &SqlitePool,
        company_id: &str,
    ) -> Result<Option<ChatConfig>> {
        if let Some(config) = self.configs.get(company_id).await {
            debug!(company_id, "config cache hit");
            return Ok(Some(config));
        }
        let config = db::chat_configs::get_config_by_company(pool, company_id).await?;
        if let Some(config) = &config {
            self.configs
                .insert(company_id.to_string(), config.clone())
                .await;
        }
        Ok(config)
    }

    pub async fn invalidate_chat(&self, chat_id: &str) {
        self.chats.invalidate(chat_id).await;
    }

    pub async fn invalidate_config(&self, company_id: &str) {
        self.configs.invalidate(company_id).await;
    }
}

impl Default for StoreCache {
    fn default() -> Self {
        Self::new()
    }
}
