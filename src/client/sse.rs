// src/client/sse.rs
// Primary strategy: reqwest-eventsource

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde_json::json;
use tracing::debug;

use super::{ChatStreamClient, FrameAccumulator, StreamOutcome};
use crate::error::Result;

/// Result of the primary strategy, as seen by the fallback decision.
pub(super) enum PrimaryOutcome {
    /// Terminal: server answered (or failed) through the stream. The
    /// fallback would only repeat the same conversation.
    Resolved(Result<StreamOutcome>),
    /// Transport failed before any content arrived, or the overall
    /// deadline expired; worth retrying raw.
    TransportFailed(String),
}

pub(super) async fn stream<F>(
    client: &ChatStreamClient,
    chat_id: &str,
    content: &str,
    on_chunk: &mut F,
) -> PrimaryOutcome
where
    F: FnMut(&str) + Send,
{
    let (url, token) = client.request_parts(chat_id);
    let builder = client
        .client()
        .post(&url)
        .bearer_auth(token)
        .json(&json!({ "content": content }));

    let mut es = match EventSource::new(builder) {
        Ok(es) => es,
        Err(e) => return PrimaryOutcome::TransportFailed(format!("eventsource setup: {e}")),
    };

    let mut acc = FrameAccumulator::new();
    let deadline = tokio::time::sleep(client.timeout());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                es.close();
                // A timeout is a rejection even when content already
                // arrived; the partial-success rule applies only to a
                // connection closed after bytes. The fallback gets its own
                // attempt with its own deadline.
                return PrimaryOutcome::TransportFailed("stream timed out".into());
            }
            event = es.next() => match event {
                None => break,
                Some(Ok(Event::Open)) => {
                    debug!(chat_id, "eventsource open");
                }
                Some(Ok(Event::Message(msg))) => {
                    match acc.apply(&msg.data) {
                        Ok(Some(chunk)) => on_chunk(&chunk),
                        Ok(None) => {}
                        Err(e) => {
                            es.close();
                            return PrimaryOutcome::Resolved(Err(e));
                        }
                    }
                    if acc.is_done() {
                        es.close();
                        break;
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => break,
                Some(Err(e)) => {
                    es.close();
                    if acc.saw_content() || acc.is_done() {
                        return PrimaryOutcome::Resolved(acc.resolve(Some(e.to_string())));
                    }
                    return PrimaryOutcome::TransportFailed(e.to_string());
                }
            }
        }
    }

    if !acc.saw_content() && !acc.is_done() {
        return PrimaryOutcome::TransportFailed("stream ended before any content".into());
    }
    PrimaryOutcome::Resolved(acc.resolve(None))
}
