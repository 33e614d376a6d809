// src/llm/mod.rs
// Model provider types and the completion provider seam

pub mod accumulator;
pub mod pipeline;
pub mod provider;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Message in a conversation, as sent to the model provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Per-request completion settings, built fresh from defaults merged with
/// the company's chat config. Never persisted.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: Option<String>,
    pub company_id: Option<String>,
    pub enable_email_function: bool,
    pub timezone: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            system_prompt: None,
            company_id: None,
            enable_email_function: false,
            timezone: None,
        }
    }
}

/// Events emitted by the upstream provider stream.
///
/// Tool-call fields arrive fragmented across many events; the accumulator
/// is the only consumer and owns reassembly.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text delta - forward to client immediately
    TextDelta { delta: String },

    /// Fragment of a tool call, keyed by provider-assigned index
    CallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },

    /// Stream completed
    Done,

    /// Metadata/lifecycle event with no payload of interest
    Ignored,
}

/// A fully reconstructed tool call, available only after stream end
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, concatenated from fragments
    pub arguments: String,
}

/// Boxed stream of provider events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Seam for the model provider connection.
///
/// Constructed once at process start and injected, so tests can substitute
/// a scripted provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Open a streaming completion for the given conversation.
    async fn open_stream(
        &self,
        messages: &[ChatMessage],
        settings: &ChatSettings,
    ) -> Result<EventStream>;
}
