// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream protocol enforcement and collection
//!
//! Providers hand their raw event streams to [`guarded`], which makes sure the
//! consumer sees exactly one terminal event, drops duplicate usage reports,
//! honors cancellation and records the request in the provider's metrics.

use chrono::Utc;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::llm::message::Message;
use crate::llm::metrics::ApiMetrics;
use crate::llm::provider::{EventStream, StreamEvent, ToolCall, TOOL_CALLS_METADATA};

enum Step {
    Cancelled,
    Event(Option<StreamEvent>),
}

/// Wrap a provider's raw stream so it obeys the event protocol.
pub fn guarded<S>(raw: S, metrics: Arc<ApiMetrics>, cancel: CancellationToken) -> EventStream
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let start = Utc::now();
        let mut raw = Box::pin(raw);
        let mut usage: Option<(u64, u64)> = None;

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                event = raw.next() => Step::Event(event),
            };
            let (input_tokens, output_tokens) = usage.unwrap_or_default();

            match step {
                Step::Cancelled => {
                    tracing::debug!("stream cancelled");
                    metrics.record_request(start, Utc::now(), false, input_tokens, output_tokens);
                    yield StreamEvent::Error(AgentError::Cancelled("stream cancelled".to_string()));
                    return;
                }
                Step::Event(None) => {
                    let error = AgentError::malformed("stream ended without a terminal event");
                    tracing::error!(error = %error, "stream failed");
                    metrics.record_request(start, Utc::now(), false, input_tokens, output_tokens);
                    yield StreamEvent::Error(error);
                    return;
                }
                Step::Event(Some(StreamEvent::Usage { input_tokens, output_tokens })) => {
                    if usage.is_some() {
                        tracing::debug!("dropping duplicate usage report");
                        continue;
                    }
                    usage = Some((input_tokens, output_tokens));
                    yield StreamEvent::Usage { input_tokens, output_tokens };
                }
                Step::Event(Some(StreamEvent::Complete)) => {
                    metrics.record_request(start, Utc::now(), true, input_tokens, output_tokens);
                    yield StreamEvent::Complete;
                    return;
                }
                Step::Event(Some(StreamEvent::Error(error))) => {
                    tracing::error!(error = %error, kind = error.kind(), "stream failed");
                    metrics.record_request(start, Utc::now(), false, input_tokens, output_tokens);
                    yield StreamEvent::Error(error);
                    return;
                }
                Step::Event(Some(event)) => yield event,
            }
        }
    })
}

/// Everything the model produced in one streamed response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<(u64, u64)>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant message for this turn. Tool calls travel in its metadata
    /// so providers can replay them on the next request.
    pub fn into_message(self) -> Message {
        let message = Message::assistant(self.text);
        if self.tool_calls.is_empty() {
            return message;
        }
        let calls = self
            .tool_calls
            .iter()
            .map(|call| {
                serde_json::json!({
                    "id": call.id,
                    "name": call.name,
                    "input": call.input,
                })
            })
            .collect();
        message.with_metadata(TOOL_CALLS_METADATA, serde_json::Value::Array(calls))
    }
}

/// Drain a stream into an [`AssistantTurn`], failing on its terminal error.
pub async fn collect(stream: EventStream) -> Result<AssistantTurn> {
    collect_with(stream, |_| {}).await
}

/// Like [`collect`], calling `on_text` for every text chunk as it arrives.
pub async fn collect_with(
    mut stream: EventStream,
    mut on_text: impl FnMut(&str),
) -> Result<AssistantTurn> {
    let mut turn = AssistantTurn::default();

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::TextChunk(text) => {
                on_text(&text);
                turn.text.push_str(&text);
            }
            StreamEvent::ToolUse { id, name, input } => {
                turn.tool_calls.push(ToolCall { id, name, input });
            }
            StreamEvent::Usage {
                input_tokens,
                output_tokens,
            } => turn.usage = Some((input_tokens, output_tokens)),
            StreamEvent::Complete => return Ok(turn),
            StreamEvent::Error(error) => return Err(error),
        }
    }

    Err(AgentError::malformed("stream ended without a terminal event"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::recorded_tool_calls;
    use futures::stream;
    use serde_json::json;

    fn run(events: Vec<StreamEvent>) -> (EventStream, Arc<ApiMetrics>) {
        let metrics = Arc::new(ApiMetrics::new());
        let guarded = guarded(
            stream::iter(events),
            metrics.clone(),
            CancellationToken::new(),
        );
        (guarded, metrics)
    }

    #[tokio::test]
    async fn test_events_after_terminal_are_dropped() {
        let (events, metrics) = run(vec![
            StreamEvent::TextChunk("a".into()),
            StreamEvent::Complete,
            StreamEvent::TextChunk("late".into()),
            StreamEvent::Complete,
        ]);
        let seen: Vec<StreamEvent> = events.collect().await;
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], StreamEvent::Complete));
        assert_eq!(metrics.successful_requests(), 1);
    }

    #[tokio::test]
    async fn test_missing_terminal_becomes_error() {
        let (events, metrics) = run(vec![StreamEvent::TextChunk("cut".into())]);
        let seen: Vec<StreamEvent> = events.collect().await;
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], StreamEvent::Error(AgentError::Provider { .. })));
        assert_eq!(metrics.failed_requests(), 1);
    }

    #[tokio::test]
    async fn test_usage_reported_once_and_recorded() {
        let (events, metrics) = run(vec![
            StreamEvent::Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            StreamEvent::Usage {
                input_tokens: 99,
                output_tokens: 99,
            },
            StreamEvent::Complete,
        ]);
        let turn = collect(events).await.unwrap();
        assert_eq!(turn.usage, Some((10, 5)));
        assert_eq!(metrics.total_input_tokens(), 10);
        assert_eq!(metrics.total_output_tokens(), 5);
    }

    #[tokio::test]
    async fn test_cancel_before_poll_never_touches_inner() {
        let metrics = Arc::new(ApiMetrics::new());
        let cancel = CancellationToken::new();
        let polled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = polled.clone();
        let inner = stream::once(async move {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            StreamEvent::Complete
        });

        let events = guarded(inner, metrics.clone(), cancel.clone());
        cancel.cancel();
        let seen: Vec<StreamEvent> = events.collect().await;

        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], StreamEvent::Error(AgentError::Cancelled(_))));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(metrics.failed_requests(), 1);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let metrics = Arc::new(ApiMetrics::new());
        let cancel = CancellationToken::new();
        let inner = stream::iter(vec![StreamEvent::TextChunk("first".into())])
            .chain(stream::pending());
        let mut events = guarded(inner, metrics, cancel.clone());

        assert!(matches!(events.next().await, Some(StreamEvent::TextChunk(_))));
        cancel.cancel();
        assert!(matches!(
            events.next().await,
            Some(StreamEvent::Error(AgentError::Cancelled(_)))
        ));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_with_observes_chunks() {
        let (events, _) = run(vec![
            StreamEvent::TextChunk("Hel".into()),
            StreamEvent::TextChunk("lo".into()),
            StreamEvent::ToolUse {
                id: "toolu_1".into(),
                name: "read_file".into(),
                input: json!({"path": "a.txt"}),
            },
            StreamEvent::Complete,
        ]);
        let mut chunks = Vec::new();
        let turn = collect_with(events, |text| chunks.push(text.to_string()))
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Hel", "lo"]);
        assert_eq!(turn.text, "Hello");
        assert!(turn.has_tool_calls());

        let message = turn.into_message();
        assert_eq!(message.content, "Hello");
        let calls = recorded_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_1");
        assert_eq!(calls[0].input, json!({"path": "a.txt"}));
    }

    #[tokio::test]
    async fn test_collect_returns_terminal_error() {
        let (events, _) = run(vec![
            StreamEvent::TextChunk("partial".into()),
            StreamEvent::Error(AgentError::provider(500, "boom")),
        ]);
        let err = collect(events).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider { status: Some(500), .. }));
    }
}
