// tests/rest_chat.rs
// Router-level tests: chat CRUD plus the SSE stream wire format

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use talkwire::config::Config;
use talkwire::db;
use talkwire::error::Result;
use talkwire::functions::CallDispatcher;
use talkwire::functions::email::{EmailData, EmailSender};
use talkwire::llm::pipeline::CompletionPipeline;
use talkwire::llm::{ChatMessage, ChatSettings, CompletionProvider, EventStream, StreamEvent};
use talkwire::retrieval::NoopRetriever;
use talkwire::server::{AppState, create_router};

const JWT_SECRET: &str = "integration-test-secret";

/// Provider that scripts the same reply for every stream
struct CannedProvider {
    events: Vec<StreamEvent>,
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    async fn open_stream(
        &self,
        _messages: &[ChatMessage],
        _settings: &ChatSettings,
    ) -> Result<EventStream> {
        let events: Vec<Result<StreamEvent>> = self.events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

struct SilentEmailer(Mutex<Vec<EmailData>>);

#[async_trait]
impl EmailSender for SilentEmailer {
    async fn send_email(&self, email: &EmailData) -> bool {
        self.0.lock().unwrap().push(email.clone());
        true
    }
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        jwt_secret: JWT_SECRET.into(),
        openai_api_key: "unused".into(),
        openai_base_url: "http://localhost".into(),
        email_api_url: None,
        email_api_key: None,
        retrieval_api_url: None,
        retrieval_api_key: None,
    }
}

async fn make_app(events: Vec<StreamEvent>) -> (Router, sqlx::SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();

    // A known company, with the email function enabled
    db::chat_configs::upsert_config(
        &pool,
        &db::ChatConfig {
            company_id: "acme".into(),
            system_prompt: Some("Be helpful.".into()),
            model: None,
            temperature: None,
            enable_email_function: true,
            timezone: None,
            updated_at: 0,
        },
    )
    .await
    .unwrap();

    let pipeline = Arc::new(CompletionPipeline::new(
        Arc::new(CannedProvider { events }),
        CallDispatcher::new(Arc::new(SilentEmailer(Mutex::new(Vec::new())))),
    ));
    let state = AppState::new(pool.clone(), Arc::new(test_config()), pipeline, Arc::new(NoopRetriever));
    (create_router(state), pool)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_chat(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/chats")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"companyId": "acme"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    (
        body["chat"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn create_chat_rejects_unknown_company() {
    let (app, _pool) = make_app(vec![StreamEvent::Done]).await;

    let response = app
        .oneshot(
            Request::post("/api/chats")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"companyId": "ghost"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INVALID_COMPANY");
}

#[tokio::test]
async fn chat_endpoints_require_matching_token() {
    let (app, _pool) = make_app(vec![StreamEvent::Done]).await;
    let (chat_id, _token) = create_chat(&app).await;

    // No token at all
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/{chat_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Token for a different chat
    let (_other_chat, other_token) = create_chat(&app).await;
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/{chat_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {other_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rename_visible_after_cache_invalidation() {
    let (app, _pool) = make_app(vec![StreamEvent::Done]).await;
    let (chat_id, token) = create_chat(&app).await;

    // Warm the cache
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/{chat_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::put(format!("/api/chats/{chat_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"title": "Billing"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/{chat_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["chat"]["title"], "Billing");
}

/// Split an SSE body into its `data:` payloads and comment lines
fn parse_sse(body: &str) -> (Vec<Value>, Vec<String>) {
    let mut frames = Vec::new();
    let mut comments = Vec::new();
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                frames.push(serde_json::from_str(data).unwrap());
            }
        } else if let Some(comment) = line.strip_prefix(':') {
            comments.push(comment.trim().to_string());
        }
    }
    (frames, comments)
}

#[tokio::test]
async fn stream_emits_connected_chunks_done_marker() {
    let events = vec![
        StreamEvent::TextDelta { delta: "Hel".into() },
        StreamEvent::TextDelta { delta: "lo".into() },
        StreamEvent::Done,
    ];
    let (app, pool) = make_app(events).await;
    let (chat_id, token) = create_chat(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/chats/{chat_id}/stream?token={token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"content": "Say hello"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Accel-Buffering").unwrap(),
        "no"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    let (frames, comments) = parse_sse(&body);

    assert_eq!(frames[0]["type"], "connected");
    assert_eq!(frames[0]["chatId"], chat_id);
    let chunk_text: String = frames
        .iter()
        .filter(|f| f["type"] == "chunk")
        .map(|f| f["content"].as_str().unwrap())
        .collect();
    assert_eq!(chunk_text, "Hello");
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "done");
    assert_eq!(last["fullContent"], "Hello");
    // Termination marker after the terminal event
    assert!(!comments.is_empty());

    // User at sequence 1, assistant at sequence 2
    let messages = db::messages::get_messages_by_chat_id(&pool, &chat_id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        (messages[0].role.as_str(), messages[0].sequence_number),
        ("user", 1)
    );
    assert_eq!(
        (messages[1].role.as_str(), messages[1].sequence_number),
        ("assistant", 2)
    );
    assert_eq!(messages[1].content, "Hello");
}

#[tokio::test]
async fn stream_validation_errors_travel_in_band() {
    let (app, _pool) = make_app(vec![StreamEvent::Done]).await;
    let (chat_id, token) = create_chat(&app).await;

    // Missing content
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/{chat_id}/stream?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let (frames, _) = parse_sse(&String::from_utf8(body.to_vec()).unwrap());
    assert_eq!(frames[0]["type"], "connected");
    assert_eq!(frames[1]["type"], "error");
    assert_eq!(frames[1]["code"], "INVALID_REQUEST");

    // Bad token
    let response = app
        .clone()
        .oneshot(
            Request::get(format!(
                "/api/chats/{chat_id}/stream?token=garbage&content=hi"
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let (frames, _) = parse_sse(&String::from_utf8(body.to_vec()).unwrap());
    assert_eq!(frames[1]["type"], "error");
    assert_eq!(frames[1]["code"], "TOKEN_INVALID");

    // Unknown chat
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats/no-such-chat/stream?token={token}&content=hi"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let (frames, _) = parse_sse(&String::from_utf8(body.to_vec()).unwrap());
    assert_eq!(frames[1]["type"], "error");
    assert_eq!(frames[1]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_removes_chat_and_messages() {
    let (app, pool) = make_app(vec![
        StreamEvent::TextDelta { delta: "ok".into() },
        StreamEvent::Done,
    ])
    .await;
    let (chat_id, token) = create_chat(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/chats/{chat_id}/stream?token={token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"content": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let _ = response.into_body().collect().await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/chats/{chat_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(db::chats::get_chat_by_id(&pool, &chat_id).await.unwrap().is_none());
    assert!(db::messages::get_messages_by_chat_id(&pool, &chat_id)
        .await
        .unwrap()
        .is_empty());
}
