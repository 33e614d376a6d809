// src/llm/pipeline.rs
// Streaming completion orchestrator: drives the upstream stream, forwards
// text to the chunk sink, and splices follow-ups for dispatched calls

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::accumulator::StreamAccumulator;
use super::{ChatMessage, ChatSettings, CompletionProvider, StreamEvent};
use crate::error::{Result, TalkwireError};
use crate::functions::followup::{FOLLOWUP_CHUNK_CHARS, chunk_text, synthesize};
use crate::functions::{CallDispatcher, DispatchContext};

/// Hard cap on messages sent upstream. System messages are prioritized and
/// never dropped; the most recent non-system messages fill the remainder.
const MAX_CONTEXT_MESSAGES: usize = 30;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful customer support assistant.";

/// Appended in-band when the upstream stream fails mid-answer, so the user
/// sees that the partial text is partial.
const STREAM_ERROR_MARKER: &str = "\n\n[The connection to the assistant was interrupted.]";

/// Sink for outward text chunks. Send failures mean the client is gone and
/// are ignored; the pipeline drains the upstream regardless.
pub type ChunkSink = mpsc::Sender<String>;

/// Composes accumulator, dispatcher, and follow-up synthesis over one
/// provider stream.
pub struct CompletionPipeline {
    provider: Arc<dyn CompletionProvider>,
    dispatcher: CallDispatcher,
}

impl CompletionPipeline {
    pub fn new(provider: Arc<dyn CompletionProvider>, dispatcher: CallDispatcher) -> Self {
        Self {
            provider,
            dispatcher,
        }
    }

    /// Run one completion turn. Returns the full concatenated text (model
    /// output plus any follow-ups) on success.
    ///
    /// Upstream errors are re-raised after an in-band marker is forwarded;
    /// dispatch failures never escape, they degrade to a failure follow-up.
    pub async fn run(
        &self,
        messages: Vec<ChatMessage>,
        settings: &ChatSettings,
        tx: &ChunkSink,
    ) -> Result<String> {
        let prior_messages = messages.clone();
        let prepared = prepare_context(messages, settings);

        let mut stream = self.provider.open_stream(&prepared, settings).await?;
        let mut accumulator = StreamAccumulator::new();

        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let Some(delta) = accumulator.reduce(&event) {
                        // Client disconnect is a silent no-op; keep draining
                        let _ = tx.send(delta).await;
                    }
                    if matches!(event, StreamEvent::Done) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream failed mid-turn");
                    let _ = tx.send(STREAM_ERROR_MARKER.to_string()).await;
                    return Err(TalkwireError::Stream(e.to_string()));
                }
            }
        }

        let mut full_text = accumulator.full_text().to_string();
        let calls = accumulator.finalize();

        if !calls.is_empty() {
            info!(calls = calls.len(), "dispatching completed tool calls");
        }

        // Strictly sequential, in index order: call N's follow-up must not
        // interleave with call N+1's on the wire.
        let context = DispatchContext {
            prior_messages: &prior_messages,
            company_id: settings.company_id.as_deref(),
        };
        for call in &calls {
            let outcome = self.dispatcher.dispatch(call, &context).await;
            debug!(call = %call.name, success = outcome.success, error = ?outcome.error,
                   "tool call dispatched");

            let followup = synthesize(&call.name, outcome.success);
            for chunk in chunk_text(followup, FOLLOWUP_CHUNK_CHARS) {
                let _ = tx.send(chunk).await;
            }
            full_text.push_str(followup);
        }

        Ok(full_text)
    }
}

/// Truncate to the context cap and prepend the dated system message.
fn prepare_context(messages: Vec<ChatMessage>, settings: &ChatSettings) -> Vec<ChatMessage> {
    let (system, non_system): (Vec<_>, Vec<_>) =
        messages.into_iter().partition(|m| m.is_system());

    let budget = MAX_CONTEXT_MESSAGES.saturating_sub(system.len());
    let skip = non_system.len().saturating_sub(budget);
    let recent = non_system.into_iter().skip(skip);

    let prompt = settings
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let dated = ChatMessage::system(format!(
        "{prompt}\n\nCurrent date and time: {}",
        render_now(settings.timezone.as_deref())
    ));

    std::iter::once(dated).chain(system).chain(recent).collect()
}

/// Render the current date/time in the caller's timezone (fixed-offset
/// strings like "+02:00"; anything unparseable falls back to UTC).
fn render_now(timezone: Option<&str>) -> String {
    let offset = timezone.and_then(parse_offset);
    match offset {
        Some(offset) => Utc::now()
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M (%:z)")
            .to_string(),
        None => Utc::now().format("%Y-%m-%d %H:%M (UTC)").to_string(),
    }
}

/// Parse "UTC", "+HH:MM" / "-HH:MM", or "UTC+H" / "UTC-H" offsets
fn parse_offset(tz: &str) -> Option<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let tz = tz.strip_prefix("UTC").unwrap_or(tz);
    let (sign, rest) = match tz.as_bytes().first() {
        Some(b'+') => (1i32, &tz[1..]),
        Some(b'-') => (-1i32, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
