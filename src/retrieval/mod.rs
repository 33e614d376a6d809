// src/retrieval/mod.rs
// Knowledge-base retrieval that augments the system prompt

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How many documents accompany each completion
const TOP_K: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

/// Seam for the retrieval backend. Retrieval is best-effort: failures are
/// logged and produce an empty result, never an error.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, company_id: &str, query: &str) -> Vec<RetrievedDocument>;
}

/// Retrieval over an HTTP search API
pub struct HttpRetriever {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpRetriever {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    company_id: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    documents: Vec<RetrievedDocument>,
}

#[async_trait]
impl DocumentRetriever for HttpRetriever {
    async fn retrieve(&self, company_id: &str, query: &str) -> Vec<RetrievedDocument> {
        let request = RetrievalRequest {
            company_id,
            query,
            top_k: TOP_K,
        };

        let result = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<RetrievalResponse>().await {
                    Ok(body) => {
                        debug!(company_id, count = body.documents.len(), "documents retrieved");
                        body.documents
                    }
                    Err(e) => {
                        warn!(company_id, error = %e, "retrieval response unreadable");
                        Vec::new()
                    }
                }
            }
            Ok(resp) => {
                warn!(company_id, status = %resp.status(), "retrieval request rejected");
                Vec::new()
            }
            Err(e) => {
                warn!(company_id, error = %e, "retrieval request failed");
                Vec::new()
            }
        }
    }
}

/// Disabled retrieval, used when no retrieval API is configured
pub struct NoopRetriever;

#[async_trait]
impl DocumentRetriever for NoopRetriever {
    async fn retrieve(&self, _company_id: &str, _query: &str) -> Vec<RetrievedDocument> {
        Vec::new()
    }
}

/// Render retrieved documents as a context block appended to the system
/// prompt. Empty input renders nothing.
pub fn format_documents_as_context(documents: &[RetrievedDocument]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }
    let mut out = String::from(
        "Use the following documents to answer when relevant. \
         If they do not cover the question, say so.\n",
    );
    for (i, doc) in documents.iter().enumerate() {
        out.push_str(&format!("\n[Document {}]\n{}\n", i + 1, doc.content.trim()));
    }
    Some(out)
}
