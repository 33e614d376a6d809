// src/functions/email.rs
// Email delivery collaborator

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// Payload handed to the delivery service
#[derive(Debug, Clone, Serialize)]
pub struct EmailData {
    pub to: String,
    pub subject: String,
    pub summary: String,
    /// Recent conversation turns, oldest first, "role: content" lines
    pub history: Vec<String>,
}

/// Seam for transactional email delivery.
///
/// Returns whether delivery succeeded; implementations must not panic or
/// propagate errors past this boundary.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, email: &EmailData) -> bool;
}

/// Delivery over an HTTP JSON email API
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpEmailSender {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_email(&self, email: &EmailData) -> bool {
        let result = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(email)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(to = %email.to, "email delivered");
                true
            }
            Ok(resp) => {
                warn!(to = %email.to, status = %resp.status(), "email delivery rejected");
                false
            }
            Err(e) => {
                warn!(to = %email.to, error = %e, "email delivery failed");
                false
            }
        }
    }
}

/// Disabled delivery, used when no email API is configured
pub struct NoopEmailSender;

#[async_trait]
impl EmailSender for NoopEmailSender {
    async fn send_email(&self, email: &EmailData) -> bool {
        warn!(to = %email.to, "email delivery not configured, dropping email");
        false
    }
}
