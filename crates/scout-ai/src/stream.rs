//! Canonical streaming events
//!
//! Every adapter translates its provider's wire events into this shape, so
//! consumers never see provider-specific framing. Ordering guarantees:
//! `ToolCallStart` fires as soon as a call's identity (id + name) is known;
//! `ToolCallEnd` fires only once its arguments are structurally complete;
//! exactly one terminal event (`Done` or `Error`) closes the stream.

use crate::{
    error::{Error, Result},
    types::{ChatResponse, StopReason, ToolCall, Usage},
};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Events emitted while streaming a model response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text content
    Text { delta: String },
    /// A tool call's identity is known (arguments may still be streaming)
    ToolCallStart { call: ToolCall },
    /// A tool call's arguments are complete
    ToolCallEnd { call: ToolCall },
    /// The response finished normally
    Done {
        usage: Usage,
        stop_reason: StopReason,
    },
    /// The provider reported an error; no further events follow
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// A pinned, boxed stream of canonical events
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Drain a stream into a complete response.
///
/// Text deltas are concatenated and tool calls collected from their
/// `ToolCallEnd` events. An `Error` event or a stream that closes without a
/// terminal event becomes an `Err`.
pub async fn collect_response(mut stream: EventStream) -> Result<ChatResponse> {
    let mut content = String::new();
    let mut tool_calls = Vec::new();

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Text { delta } => content.push_str(&delta),
            StreamEvent::ToolCallStart { .. } => {}
            StreamEvent::ToolCallEnd { call } => tool_calls.push(call),
            StreamEvent::Done { usage, stop_reason } => {
                return Ok(ChatResponse {
                    content,
                    tool_calls,
                    stop_reason,
                    usage,
                });
            }
            StreamEvent::Error { message } => {
                return Err(Error::api("stream_error", message));
            }
        }
    }

    Err(Error::IncompleteStream(
        "stream closed without a completion event".into(),
    ))
}

/// Synthesize the canonical event sequence from an already-complete response.
///
/// Used by adapters whose backend cannot stream: the caller still observes
/// the normal event ordering, just all at once.
pub fn synthesize_events(response: &ChatResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if !response.content.is_empty() {
        events.push(StreamEvent::Text {
            delta: response.content.clone(),
        });
    }
    for call in &response.tool_calls {
        events.push(StreamEvent::ToolCallStart { call: call.clone() });
        events.push(StreamEvent::ToolCallEnd { call: call.clone() });
    }
    events.push(StreamEvent::Done {
        usage: response.usage,
        stop_reason: response.stop_reason,
    });
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn boxed(events: Vec<StreamEvent>) -> EventStream {
        Box::pin(futures::stream::iter(events))
    }

    #[tokio::test]
    async fn test_collect_text_and_tool_calls() {
        let call = ToolCall::new("call_1", "grep", json!({"pattern": "main"}));
        let stream = boxed(vec![
            StreamEvent::Text {
                delta: "Searching".into(),
            },
            StreamEvent::Text {
                delta: " now.".into(),
            },
            StreamEvent::ToolCallStart { call: call.clone() },
            StreamEvent::ToolCallEnd { call: call.clone() },
            StreamEvent::Done {
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 4,
                    total_tokens: 14,
                },
                stop_reason: StopReason::ToolUse,
            },
        ]);

        let response = collect_response(stream).await.unwrap();
        assert_eq!(response.content, "Searching now.");
        assert_eq!(response.tool_calls, vec![call]);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[tokio::test]
    async fn test_collect_error_event() {
        let stream = boxed(vec![
            StreamEvent::Text {
                delta: "partial".into(),
            },
            StreamEvent::Error {
                message: "overloaded".into(),
            },
        ]);
        let err = collect_response(stream).await.unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[tokio::test]
    async fn test_collect_truncated_stream() {
        let stream = boxed(vec![StreamEvent::Text {
            delta: "never finished".into(),
        }]);
        let err = collect_response(stream).await.unwrap_err();
        assert!(matches!(err, Error::IncompleteStream(_)));
    }

    #[test]
    fn test_synthesize_event_ordering() {
        let response = ChatResponse {
            content: "done".into(),
            tool_calls: vec![ToolCall::new("call_1", "list", json!({"path": "."}))],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        };
        let events = synthesize_events(&response);
        assert!(matches!(events[0], StreamEvent::Text { .. }));
        assert!(matches!(events[1], StreamEvent::ToolCallStart { .. }));
        assert!(matches!(events[2], StreamEvent::ToolCallEnd { .. }));
        assert!(events.last().unwrap().is_terminal());
    }
}
