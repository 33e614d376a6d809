// src/server/stream.rs
// SSE streaming completion endpoint

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::AppState;
use super::chats::authorize;
use crate::db::{self, Chat};
use crate::error::{Result, TalkwireError};
use crate::llm::ChatMessage;
use crate::retrieval::format_documents_as_context;

/// Wire events carried as SSE `data:` payloads.
///
/// Per request: exactly one `connected`, zero or more `chunk`s, then exactly
/// one of `done` / `error`, then a bare `:` comment line, then close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WireEvent {
    Connected { chat_id: String },
    Chunk { content: String },
    Done { full_content: String },
    Error { error: String, code: String },
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct StreamBody {
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// One turn's inputs, regardless of how they arrived
#[derive(Debug, Default)]
struct TurnParams {
    content: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
}

/// GET /api/chats/{id}/stream (EventSource clients; parameters in the query)
pub async fn stream_chat_get(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let params = TurnParams {
        content: query.content,
        model: query.model,
        temperature: query.temperature,
    };
    stream_response(state, chat_id, headers, query.token, params).await
}

/// POST /api/chats/{id}/stream (content in the JSON body)
pub async fn stream_chat_post(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<StreamBody>,
) -> Response {
    let params = TurnParams {
        content: Some(body.content),
        model: body.model.or(query.model),
        temperature: body.temperature.or(query.temperature),
    };
    stream_response(state, chat_id, headers, query.token, params).await
}

/// Build the SSE response. Every outcome, including validation failures, is
/// delivered inside the stream; the HTTP status is always 200.
async fn stream_response(
    state: AppState,
    chat_id: String,
    headers: HeaderMap,
    token: Option<String>,
    params: TurnParams,
) -> Response {
    let (tx, mut rx) = mpsc::channel::<WireEvent>(64);

    tokio::spawn(async move {
        process_stream(state, chat_id, headers, token, params, tx).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok::<_, Infallible>(Event::default().data(data));
            if matches!(event, WireEvent::Done { .. } | WireEvent::Error { .. }) {
                break;
            }
        }
        // Termination marker: a bare comment line
        yield Ok(Event::default().comment(""));
    };

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    let response_headers = response.headers_mut();
    response_headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    response_headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    response_headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

/// Drive one completion turn, emitting wire events into the channel.
///
/// Send failures mean the client went away; the turn still runs to the end
/// so the assistant message is persisted.
async fn process_stream(
    state: AppState,
    chat_id: String,
    headers: HeaderMap,
    token: Option<String>,
    params: TurnParams,
    tx: mpsc::Sender<WireEvent>,
) {
    let _ = tx
        .send(WireEvent::Connected {
            chat_id: chat_id.clone(),
        })
        .await;

    let result = run_turn(&state, &chat_id, &headers, token, params, &tx).await;
    match result {
        Ok(full_content) => {
            let _ = tx.send(WireEvent::Done { full_content }).await;
        }
        Err(e) => {
            warn!(chat_id, error = %e, "stream turn failed");
            let _ = tx
                .send(WireEvent::Error {
                    error: e.to_string(),
                    code: e.wire_code().to_string(),
                })
                .await;
        }
    }
}

async fn run_turn(
    state: &AppState,
    chat_id: &str,
    headers: &HeaderMap,
    token: Option<String>,
    params: TurnParams,
    tx: &mpsc::Sender<WireEvent>,
) -> Result<String> {
    let content = params
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| TalkwireError::InvalidInput("content is required".into()))?;

    let chat = authorize(state, chat_id, headers, token.as_deref()).await?;
    if chat.company_id.trim().is_empty() {
        return Err(TalkwireError::InvalidChat(chat_id.to_string()));
    }

    let config = state
        .cache
        .get_config(&state.pool, &chat.company_id)
        .await?
        .ok_or_else(|| TalkwireError::InvalidCompany(chat.company_id.clone()))?;
    let mut settings = config.to_settings();
    if let Some(model) = params.model {
        settings.model = model;
    }
    if let Some(temperature) = params.temperature {
        settings.temperature = temperature;
    }

    // Both sequence numbers are fixed up front: the user message lands
    // before the stream, the assistant message after it.
    let latest = db::messages::get_latest_sequence_number(&state.pool, chat_id).await?;
    let user_seq = latest + 1;
    let assistant_seq = latest + 2;

    let prior = db::messages::get_messages_by_chat_id(&state.pool, chat_id).await?;
    db::messages::create_message(
        &state.pool,
        chat_id,
        chat.user_identifier.as_deref(),
        "user",
        &content,
        user_seq,
    )
    .await?;
    db::chats::touch_chat(&state.pool, chat_id).await?;

    augment_with_documents(state, &chat, &content, &mut settings).await;

    let mut messages: Vec<ChatMessage> = prior
        .iter()
        .map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();
    messages.push(ChatMessage::user(content));

    info!(chat_id, company_id = %chat.company_id, "streaming completion started");

    // Bridge the pipeline's text sink onto the wire event channel
    let (text_tx, mut text_rx) = mpsc::channel::<String>(64);
    let wire_tx = tx.clone();
    let forward = tokio::spawn(async move {
        while let Some(content) = text_rx.recv().await {
            let _ = wire_tx.send(WireEvent::Chunk { content }).await;
        }
    });

    let result = state.pipeline.run(messages, &settings, &text_tx).await;
    drop(text_tx);
    let _ = forward.await;

    let full_content = result?;
    db::messages::create_message(
        &state.pool,
        chat_id,
        None,
        "assistant",
        &full_content,
        assistant_seq,
    )
    .await?;
    db::chats::touch_chat(&state.pool, chat_id).await?;

    info!(chat_id, chars = full_content.len(), "streaming completion finished");
    Ok(full_content)
}

/// Best-effort retrieval: appends a document context block to the system
/// prompt. Failures are swallowed inside the retriever.
async fn augment_with_documents(
    state: &AppState,
    chat: &Chat,
    query: &str,
    settings: &mut crate::llm::ChatSettings,
) {
    let documents = state.retriever.retrieve(&chat.company_id, query).await;
    if let Some(context) = format_documents_as_context(&documents) {
        settings.system_prompt = Some(match settings.system_prompt.take() {
            Some(prompt) => format!("{prompt}\n\n{context}"),
            None => context,
        });
    }
}
