// src/client/mod.rs
// Client for the streaming chat endpoint, with two transport strategies

pub mod fallback;
pub mod sse;

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TalkwireError};

/// Overall deadline for one streamed completion, both strategies
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal state of one streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// Server sent `done`
    Complete(String),
    /// Transport dropped after some content arrived; text is what came through
    Partial(String),
}

impl StreamOutcome {
    pub fn text(&self) -> &str {
        match self {
            StreamOutcome::Complete(text) | StreamOutcome::Partial(text) => text,
        }
    }
}

/// Folds server frames into the accumulated text. Shared by both
/// strategies so they cannot drift in frame interpretation.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    text: String,
    done: Option<String>,
    saw_content: bool,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one raw `data:` payload. Returns the chunk text, if any, so the
    /// caller can surface it incrementally.
    ///
    /// Tolerant by design: the `[DONE]` sentinel, unparseable frames, and
    /// frames without a `content` field are all skipped. A frame with a
    /// `content` field but no `type` tag is treated as a chunk.
    pub fn apply(&mut self, data: &str) -> Result<Option<String>> {
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(None);
        }
        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "skipping unparseable frame");
                return Ok(None);
            }
        };
        match value.get("type").and_then(Value::as_str) {
            Some("connected") => {
                debug!("stream connected");
                Ok(None)
            }
            Some("chunk") | None => match value.get("content").and_then(Value::as_str) {
                Some(content) if !content.is_empty() => {
                    self.saw_content = true;
                    self.text.push_str(content);
                    Ok(Some(content.to_string()))
                }
                _ => Ok(None),
            },
            Some("done") => {
                let full = value
                    .get("fullContent")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.text.clone());
                self.done = Some(full);
                Ok(None)
            }
            Some("error") => {
                let message = value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error");
                warn!(code = ?value.get("code"), "server reported stream error");
                Err(TalkwireError::Stream(message.to_string()))
            }
            Some(other) => {
                debug!(kind = other, "ignoring unknown frame type");
                Ok(None)
            }
        }
    }

    /// Whether any chunk content has arrived
    pub fn saw_content(&self) -> bool {
        self.saw_content
    }

    /// Whether the server has sent its terminal `done` frame
    pub fn is_done(&self) -> bool {
        self.done.is_some()
    }

    /// Resolve the stream. A transport failure after content arrived is a
    /// partial success; before any content it is a hard error.
    pub fn resolve(self, transport_error: Option<String>) -> Result<StreamOutcome> {
        if let Some(full) = self.done {
            return Ok(StreamOutcome::Complete(full));
        }
        match transport_error {
            Some(e) if !self.saw_content => Err(TalkwireError::Stream(e)),
            None if !self.saw_content => {
                Err(TalkwireError::Stream("stream ended before any content".into()))
            }
            _ => Ok(StreamOutcome::Partial(self.text)),
        }
    }
}

/// Streams one completion, trying the eventsource strategy first and the
/// raw-bytes fallback when the primary fails or times out before completing.
pub struct ChatStreamClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl ChatStreamClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            timeout: STREAM_TIMEOUT,
        }
    }

    /// Override the per-strategy deadline (defaults to [`STREAM_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn stream_url(&self, chat_id: &str) -> String {
        format!(
            "{}/api/chats/{}/stream",
            self.base_url.trim_end_matches('/'),
            chat_id
        )
    }

    /// Stream one completion, invoking `on_chunk` for each piece of text as
    /// it arrives.
    pub async fn stream_message<F>(
        &self,
        chat_id: &str,
        content: &str,
        mut on_chunk: F,
    ) -> Result<StreamOutcome>
    where
        F: FnMut(&str) + Send,
    {
        match sse::stream(self, chat_id, content, &mut on_chunk).await {
            sse::PrimaryOutcome::Resolved(result) => result,
            sse::PrimaryOutcome::TransportFailed(reason) => {
                warn!(reason, "eventsource strategy failed, trying raw fallback");
                fallback::stream(self, chat_id, content, &mut on_chunk).await
            }
        }
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn request_parts(&self, chat_id: &str) -> (String, &str) {
        (self.stream_url(chat_id), &self.token)
    }
}
