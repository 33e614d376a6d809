// src/client/fallback.rs
// Fallback strategy: raw byte stream with manual SSE frame reassembly

use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use super::{ChatStreamClient, FrameAccumulator, StreamOutcome};
use crate::error::{Result, TalkwireError};

pub(super) async fn stream<F>(
    client: &ChatStreamClient,
    chat_id: &str,
    content: &str,
    on_chunk: &mut F,
) -> Result<StreamOutcome>
where
    F: FnMut(&str) + Send,
{
    let (url, token) = client.request_parts(chat_id);
    let response = client
        .client()
        .post(&url)
        .bearer_auth(token)
        .json(&json!({ "content": content }))
        // Covers the whole body read, matching the primary's deadline
        .timeout(client.timeout())
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(TalkwireError::Stream(format!(
            "unexpected status {}",
            response.status()
        )));
    }
    debug!(chat_id, "raw fallback stream open");

    let mut bytes = response.bytes_stream();
    let mut acc = FrameAccumulator::new();
    let mut raw: Vec<u8> = Vec::new();
    let mut buffer = String::new();

    'read: while let Some(piece) = bytes.next().await {
        let piece = match piece {
            Ok(piece) => piece,
            // The deadline rejects outright; only a dropped connection
            // downgrades to a partial success.
            Err(e) if e.is_timeout() => {
                return Err(TalkwireError::Stream("stream timed out".into()));
            }
            Err(e) => return acc.resolve(Some(e.to_string())),
        };

        // Incremental UTF-8 decode: hold back a trailing partial code point
        raw.extend_from_slice(&piece);
        let valid_len = match std::str::from_utf8(&raw) {
            Ok(_) => raw.len(),
            Err(e) => e.valid_up_to(),
        };
        buffer.push_str(&String::from_utf8_lossy(&raw[..valid_len]));
        raw.drain(..valid_len);

        // Frames are separated by a blank line
        while let Some(pos) = find_frame_boundary(&buffer) {
            let frame = buffer[..pos.start].to_string();
            buffer.drain(..pos.end);
            if let Some(data) = extract_data(&frame) {
                match acc.apply(&data) {
                    Ok(Some(chunk)) => on_chunk(&chunk),
                    Ok(None) => {}
                    Err(e) => return Err(e),
                }
            }
            if acc.is_done() {
                break 'read;
            }
        }
    }

    // Whatever is left after the stream ends is treated as a final frame
    if !acc.is_done() {
        let leftover = buffer.trim();
        if !leftover.is_empty()
            && let Some(data) = extract_data(leftover)
        {
            match acc.apply(&data) {
                Ok(Some(chunk)) => on_chunk(&chunk),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
    }

    acc.resolve(None)
}

struct FrameBoundary {
    /// Frame length, excluding the separator
    start: usize,
    /// Frame length including the separator
    end: usize,
}

fn find_frame_boundary(buffer: &str) -> Option<FrameBoundary> {
    buffer.find("\n\n").map(|pos| FrameBoundary {
        start: pos,
        end: pos + 2,
    })
}

/// Pull the `data:` payload out of one SSE frame. Multiple data lines join
/// with a newline; comment and event lines are ignored.
fn extract_data(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| {
            line.strip_prefix("data:")
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
