// src/db/chat_configs.rs
// Per-company completion settings, merged over defaults at request time

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::now_ts;
use crate::error::Result;
use crate::llm::ChatSettings;

/// Maps directly to the `chat_configs` table. All knobs are optional;
/// missing values fall back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatConfig {
    pub company_id: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub enable_email_function: bool,
    pub timezone: Option<String>,
    pub updated_at: i64,
}

impl ChatConfig {
    /// Merge this config over the default settings
    pub fn to_settings(&self) -> ChatSettings {
        let defaults = ChatSettings::default();
        ChatSettings {
            model: self.model.clone().unwrap_or(defaults.model),
            temperature: self.temperature.map(|t| t as f32).unwrap_or(defaults.temperature),
            system_prompt: self.system_prompt.clone(),
            company_id: Some(self.company_id.clone()),
            enable_email_function: self.enable_email_function,
            timezone: self.timezone.clone(),
        }
    }
}

pub async fn get_config_by_company(
    pool: &SqlitePool,
    company_id: &str,
) -> Result<Option<ChatConfig>> {
    let config =
        sqlx::query_as::<_, ChatConfig>("SELECT * FROM chat_configs WHERE company_id = ?")
            .bind(company_id)
            .fetch_optional(pool)
            .await?;
    Ok(config)
}

pub async fn upsert_config(pool: &SqlitePool, config: &ChatConfig) -> Result<()> {
    sqlx::query(
        "INSERT INTO chat_configs
             (company_id, system_prompt, model, temperature, enable_email_function,
              timezone, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(company_id) DO UPDATE SET
             system_prompt = excluded.system_prompt,
             model = excluded.model,
             temperature = excluded.temperature,
             enable_email_function = excluded.enable_email_function,
             timezone = excluded.timezone,
             updated_at = excluded.updated_at",
    )
    .bind(&config.company_id)
    .bind(&config.system_prompt)
    .bind(&config.model)
    .bind(config.temperature)
    .bind(config.enable_email_function)
    .bind(&config.timezone)
    .bind(now_ts())
    .execute(pool)
    .await?;
    Ok(())
}
