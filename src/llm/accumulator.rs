// src/llm/accumulator.rs
// Folds provider stream events into running text plus per-index tool calls

use std::collections::BTreeMap;

use tracing::warn;

use super::{CompletedCall, StreamEvent};

/// A tool call still being assembled from fragments.
///
/// One entry per distinct call index seen in the current stream. The id and
/// name are set by the first fragment that carries them; argument fragments
/// are always appended, because the provider sends them as successive
/// substrings of one JSON-encoded object.
#[derive(Debug, Default, Clone)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Stateful reducer over the upstream event sequence.
///
/// Keyed by the provider-assigned call index (dense or sparse, never
/// reused); a BTreeMap keeps finalize output in ascending index order.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    full_text: String,
    pending: BTreeMap<u32, PendingCall>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one event. Returns the text delta, if any, so the caller can
    /// forward it immediately; call fragments are absorbed silently.
    pub fn reduce(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::TextDelta { delta } => {
                self.full_text.push_str(delta);
                Some(delta.clone())
            }
            StreamEvent::CallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let call = self.pending.entry(*index).or_default();
                // First writer wins for id and name
                if call.id.is_none()
                    && let Some(id) = id
                    && !id.is_empty()
                {
                    call.id = Some(id.clone());
                }
                if call.name.is_none()
                    && let Some(name) = name
                    && !name.is_empty()
                {
                    call.name = Some(name.clone());
                }
                if let Some(args) = arguments {
                    call.arguments.push_str(args);
                }
                None
            }
            StreamEvent::Done | StreamEvent::Ignored => None,
        }
    }

    /// Full text accumulated so far
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Promote pending calls that received id, name, and arguments.
    ///
    /// Calls are never promoted mid-stream (arguments may still be
    /// arriving). Fragments that never received an id or name are dropped
    /// but logged, so a malformed upstream is distinguishable from "no call
    /// happened".
    pub fn finalize(self) -> Vec<CompletedCall> {
        let mut completed = Vec::new();
        for (index, call) in self.pending {
            match (call.id, call.name) {
                (Some(id), Some(name)) if !call.arguments.is_empty() => {
                    completed.push(CompletedCall {
                        id,
                        name,
                        arguments: call.arguments,
                    });
                }
                (id, name) => {
                    warn!(
                        index,
                        has_id = id.is_some(),
                        has_name = name.is_some(),
                        has_arguments = !call.arguments.is_empty(),
                        "dropping incomplete tool call at stream end"
                    );
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_delta(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> StreamEvent {
        StreamEvent::CallDelta {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: arguments.map(String::from),
        }
    }

    #[test]
    fn test_text_deltas_forwarded_and_accumulated() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(
            acc.reduce(&StreamEvent::TextDelta { delta: "Hel".into() }),
            Some("Hel".into())
        );
        assert_eq!(
            acc.reduce(&StreamEvent::TextDelta { delta: "lo".into() }),
            Some("lo".into())
        );
        assert_eq!(acc.full_text(), "Hello");
    }

    #[test]
    fn test_arguments_concatenated_across_fragments() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(0, Some("a"), Some("send_email"), None));
        acc.reduce(&call_delta(0, None, None, Some("{\"userEmail\":")));
        acc.reduce(&call_delta(0, None, None, Some("\"x@y.com\"")));
        acc.reduce(&call_delta(0, None, None, Some("}")));

        let calls = acc.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].name, "send_email");
        assert_eq!(calls[0].arguments, "{\"userEmail\":\"x@y.com\"}");
    }

    #[test]
    fn test_field_arrival_order_independent() {
        // Arguments arrive before the id and name
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(0, None, None, Some("{\"a\":")));
        acc.reduce(&call_delta(0, None, Some("send_email"), Some("1}")));
        acc.reduce(&call_delta(0, Some("call_9"), None, None));

        let calls = acc.finalize();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].name, "send_email");
        assert_eq!(calls[0].arguments, "{\"a\":1}");
    }

    #[test]
    fn test_id_and_name_first_writer_wins() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(0, Some("first"), Some("send_email"), Some("{}")));
        acc.reduce(&call_delta(0, Some("second"), Some("other"), None));

        let calls = acc.finalize();
        assert_eq!(calls[0].id, "first");
        assert_eq!(calls[0].name, "send_email");
    }

    #[test]
    fn test_interleaved_indices_independent() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(1, Some("b"), Some("beta"), Some("{\"k\":")));
        acc.reduce(&call_delta(0, Some("a"), Some("alpha"), Some("{}")));
        acc.reduce(&call_delta(1, None, None, Some("2}")));

        let calls = acc.finalize();
        // Ascending index order regardless of arrival order
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "alpha");
        assert_eq!(calls[1].name, "beta");
        assert_eq!(calls[1].arguments, "{\"k\":2}");
    }

    #[test]
    fn test_sparse_indices_allowed() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(7, Some("x"), Some("send_email"), Some("{}")));
        let calls = acc.finalize();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_arguments_only_index_dropped() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(0, None, None, Some("{\"orphan\":true}")));
        assert!(acc.finalize().is_empty());
    }

    #[test]
    fn test_empty_arguments_not_promoted() {
        let mut acc = StreamAccumulator::new();
        acc.reduce(&call_delta(0, Some("a"), Some("send_email"), None));
        assert!(acc.finalize().is_empty());
    }

    #[test]
    fn test_unrecognized_events_are_noops() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.reduce(&StreamEvent::Ignored), None);
        assert_eq!(acc.reduce(&StreamEvent::Done), None);
        assert_eq!(acc.full_text(), "");
        assert!(acc.finalize().is_empty());
    }
}
