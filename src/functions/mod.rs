// src/functions/mod.rs
// Dispatches reconstructed tool calls to their side-effect handlers

pub mod email;
pub mod followup;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::{ChatMessage, CompletedCall};
use email::{EmailData, EmailSender};

/// How many recent non-system messages accompany the emailed summary
const EMAIL_CONTEXT_MESSAGES: usize = 20;

/// Stable error identifiers surfaced in dispatch outcomes
pub mod dispatch_errors {
    pub const MISSING_EMAIL: &str = "MISSING_EMAIL";
    pub const MISSING_SUMMARY: &str = "MISSING_SUMMARY";
    pub const EMAIL_SERVICE_FAILURE: &str = "EMAIL_SERVICE_FAILURE";
    pub const UNKNOWN_FUNCTION_CALL: &str = "UNKNOWN_FUNCTION_CALL";
}

/// Result of dispatching one completed call. Never an Err: side-effect
/// failures degrade to `success = false` and a follow-up sentence, they do
/// not abort the user's turn.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub success: bool,
    pub error: Option<&'static str>,
    pub user_email: Option<String>,
}

impl DispatchOutcome {
    fn failure(error: &'static str) -> Self {
        Self {
            success: false,
            error: Some(error),
            user_email: None,
        }
    }
}

/// Conversation context available to handlers
pub struct DispatchContext<'a> {
    pub prior_messages: &'a [ChatMessage],
    pub company_id: Option<&'a str>,
}

/// Arguments for the built-in send_email call, as emitted by the model
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct EmailArgs {
    user_email: String,
    conversation_summary: String,
    subject: String,
}

/// Routes completed calls to the matching handler.
///
/// Forward-compatible with additional call types: unknown names yield a
/// failed outcome rather than changing the orchestrator contract.
pub struct CallDispatcher {
    emailer: Arc<dyn EmailSender>,
}

impl CallDispatcher {
    pub fn new(emailer: Arc<dyn EmailSender>) -> Self {
        Self { emailer }
    }

    pub async fn dispatch(
        &self,
        call: &CompletedCall,
        context: &DispatchContext<'_>,
    ) -> DispatchOutcome {
        match call.name.as_str() {
            "send_email" => self.dispatch_email(call, context).await,
            other => {
                warn!(call = %other, "unknown function call requested by model");
                DispatchOutcome::failure(dispatch_errors::UNKNOWN_FUNCTION_CALL)
            }
        }
    }

    async fn dispatch_email(
        &self,
        call: &CompletedCall,
        context: &DispatchContext<'_>,
    ) -> DispatchOutcome {
        // Malformed JSON fails closed the same way as missing fields
        let args: EmailArgs = serde_json::from_str(&call.arguments).unwrap_or_default();

        if args.user_email.trim().is_empty() {
            return DispatchOutcome::failure(dispatch_errors::MISSING_EMAIL);
        }
        if args.conversation_summary.trim().is_empty() {
            return DispatchOutcome::failure(dispatch_errors::MISSING_SUMMARY);
        }

        let history: Vec<String> = context
            .prior_messages
            .iter()
            .filter(|m| !m.is_system())
            .rev()
            .take(EMAIL_CONTEXT_MESSAGES)
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let subject = if args.subject.trim().is_empty() {
            "Your conversation summary".to_string()
        } else {
            args.subject
        };

        let email = EmailData {
            to: args.user_email.clone(),
            subject,
            summary: args.conversation_summary,
            history,
        };

        if self.emailer.send_email(&email).await {
            info!(call_id = %call.id, company = ?context.company_id, "send_email dispatched");
            DispatchOutcome {
                success: true,
                error: None,
                user_email: Some(args.user_email),
            }
        } else {
            DispatchOutcome::failure(dispatch_errors::EMAIL_SERVICE_FAILURE)
        }
    }
}
