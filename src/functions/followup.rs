// src/functions/followup.rs
// Canned follow-up text spliced into the stream after a dispatched call

/// Follow-up chunk size in characters.
///
/// The fixed re-chunking exists only so follow-up text reuses the same
/// chunk-sink interface as model-streamed text; there is no pacing delay.
pub const FOLLOWUP_CHUNK_CHARS: usize = 10;

const EMAIL_SUCCESS: &str = "\n\nI've sent an email summary of our conversation to your \
                             address. Is there anything else I can help you with?";
const EMAIL_FAILURE: &str = "\n\nI'm sorry, I wasn't able to send the email summary. Please \
                             double-check your email address or try again later.";
const GENERIC_FAILURE: &str = "\n\nI'm sorry, I wasn't able to complete that action.";

/// Map a dispatched call to a deterministic, human-readable follow-up.
///
/// Pure function: the sentence depends only on the call name and whether
/// dispatch succeeded, so the client cannot distinguish synthesized text
/// from model output.
pub fn synthesize(call_name: &str, success: bool) -> &'static str {
    match (call_name, success) {
        ("send_email", true) => EMAIL_SUCCESS,
        ("send_email", false) => EMAIL_FAILURE,
        // Unknown calls never succeed at dispatch
        (_, _) => GENERIC_FAILURE,
    }
}

/// Split text into fixed-size character chunks, respecting UTF-8 boundaries.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
