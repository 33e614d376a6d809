// src/llm/provider.rs
// OpenAI-compatible chat completions client with SSE streaming

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ChatMessage, ChatSettings, CompletionProvider, EventStream, StreamEvent};
use crate::error::{Result, TalkwireError};

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // "function"
    pub function: FunctionDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".into(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// The one built-in tool: email a summary of the conversation
pub fn email_tool() -> Tool {
    Tool::function(
        "send_email",
        "Send the user an email summary of the conversation. Use when the user asks \
         for a summary or transcript by email.",
        json!({
            "type": "object",
            "properties": {
                "userEmail": {
                    "type": "string",
                    "description": "The user's email address"
                },
                "conversationSummary": {
                    "type": "string",
                    "description": "A concise summary of the conversation so far"
                },
                "subject": {
                    "type": "string",
                    "description": "Email subject line"
                }
            },
            "required": ["userEmail", "conversationSummary"]
        }),
    )
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    stream: bool,
}

/// Streaming chunk
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallChunk>>,
}

/// Partial tool call in streaming
#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize, Default)]
struct FunctionChunk {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// OpenAI-compatible streaming provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Flatten one parsed SSE chunk into stream events
fn chunk_events(chunk: ChatChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(StreamEvent::TextDelta { delta: content });
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                events.push(StreamEvent::CallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                });
            }
        }
        if choice.finish_reason.is_some() {
            events.push(StreamEvent::Ignored);
        }
    }
    if events.is_empty() {
        events.push(StreamEvent::Ignored);
    }
    events
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn open_stream(
        &self,
        messages: &[ChatMessage],
        settings: &ChatSettings,
    ) -> Result<EventStream> {
        let tools = settings.enable_email_function.then(|| vec![email_tool()]);
        let request = ChatRequest {
            model: &settings.model,
            messages,
            temperature: settings.temperature,
            tools,
            stream: true,
        };

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request);

        let mut es = EventSource::new(builder)
            .map_err(|e| TalkwireError::Stream(format!("failed to open provider stream: {e}")))?;

        debug!(model = %settings.model, messages = messages.len(), "provider stream opened");

        let stream = async_stream::stream! {
            while let Some(event) = es.next().await {
                match event {
                    Ok(Event::Open) => {
                        debug!("provider SSE connection established");
                    }
                    Ok(Event::Message(msg)) => {
                        if msg.data == "[DONE]" {
                            yield Ok(StreamEvent::Done);
                            break;
                        }
                        match serde_json::from_str::<ChatChunk>(&msg.data) {
                            Ok(chunk) => {
                                for ev in chunk_events(chunk) {
                                    yield Ok(ev);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to parse provider chunk, skipping");
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        yield Ok(StreamEvent::Done);
                        break;
                    }
                    Err(e) => {
                        yield Err(TalkwireError::Stream(e.to_string()));
                        break;
                    }
                }
            }
            es.close();
        };

        Ok(Box::pin(stream))
    }
}
