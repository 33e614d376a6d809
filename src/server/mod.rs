// src/server/mod.rs
// Router and shared application state

pub mod chats;
pub mod stream;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::cache::StoreCache;
use crate::config::Config;
use crate::error::TalkwireError;
use crate::llm::pipeline::CompletionPipeline;
use crate::retrieval::DocumentRetriever;

/// Shared application state. Collaborators are injected as trait objects so
/// tests can run the full router against scripted fakes.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub cache: StoreCache,
    pub config: Arc<Config>,
    pub pipeline: Arc<CompletionPipeline>,
    pub retriever: Arc<dyn DocumentRetriever>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Arc<Config>,
        pipeline: Arc<CompletionPipeline>,
        retriever: Arc<dyn DocumentRetriever>,
    ) -> Self {
        Self {
            pool,
            cache: StoreCache::new(),
            config,
            pipeline,
            retriever,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chats", post(chats::create_chat))
        .route(
            "/api/chats/{id}",
            get(chats::get_chat)
                .put(chats::rename_chat)
                .delete(chats::delete_chat),
        )
        .route(
            "/api/chats/{id}/stream",
            get(stream::stream_chat_get).post(stream::stream_chat_post),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// JSON error responses for the REST endpoints. The streaming endpoint does
/// not use this; its errors travel inside the SSE stream.
impl IntoResponse for TalkwireError {
    fn into_response(self) -> Response {
        let status = match &self {
            TalkwireError::InvalidInput(_) | TalkwireError::InvalidChat(_) => {
                StatusCode::BAD_REQUEST
            }
            TalkwireError::InvalidCompany(_) => StatusCode::BAD_REQUEST,
            TalkwireError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            TalkwireError::Token(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({ "error": message, "code": self.wire_code() })),
        )
            .into_response()
    }
}
