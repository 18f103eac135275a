// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Plays back scripted responses through the same stream guard the real
//! providers use, and records every conversation it was sent.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AgentError, Result};
use crate::llm::conversation::Conversation;
use crate::llm::metrics::ApiMetrics;
use crate::llm::provider::{ApiProvider, EventStream, ModelInfo, StreamEvent, StreamOptions};
use crate::llm::stream;

/// A scripted reply
#[derive(Clone, Debug)]
pub struct MockResponse {
    /// Text chunks, streamed in order
    pub chunks: Vec<String>,
    /// Tool calls, streamed after the text
    pub tool_calls: Vec<MockToolCall>,
    /// Token usage
    pub usage: (u64, u64),
    /// End the response with a provider error after the text chunks
    pub failure: Option<MockFailure>,
}

/// A mock tool call
#[derive(Clone, Debug)]
pub struct MockToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A scripted provider failure
#[derive(Clone, Debug)]
pub struct MockFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            chunks: vec!["Mock response".to_string()],
            tool_calls: vec![],
            usage: (10, 20),
            failure: None,
        }
    }
}

impl MockResponse {
    /// Plain text reply in a single chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![text.into()],
            ..Self::default()
        }
    }

    /// Text reply split into the given chunks
    pub fn chunked<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Reply that asks for one tool call and has no text
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            chunks: vec![],
            ..Self::default()
        }
        .with_tool_call(id, name, input)
    }

    /// Reply that fails with a provider error before any text
    pub fn failure(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            chunks: vec![],
            ..Self::default()
        }
        .with_failure(status, message)
    }

    /// Stream the text chunks, then fail instead of completing
    pub fn with_failure(mut self, status: Option<u16>, message: impl Into<String>) -> Self {
        self.failure = Some(MockFailure {
            status,
            message: message.into(),
        });
        self
    }

    pub fn with_tool_call(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        self.tool_calls.push(MockToolCall {
            id: id.into(),
            name: name.into(),
            input,
        });
        self
    }

    fn into_events(self) -> Vec<StreamEvent> {
        let mut events: Vec<StreamEvent> = self
            .chunks
            .into_iter()
            .map(StreamEvent::TextChunk)
            .collect();
        if let Some(failure) = self.failure {
            events.push(StreamEvent::Error(AgentError::Provider {
                status: failure.status,
                message: failure.message,
            }));
            return events;
        }

        events.extend(self.tool_calls.into_iter().map(|call| StreamEvent::ToolUse {
            id: call.id,
            name: call.name,
            input: call.input,
        }));
        events.push(StreamEvent::Usage {
            input_tokens: self.usage.0,
            output_tokens: self.usage.1,
        });
        events.push(StreamEvent::Complete);
        events
    }
}

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    model: ModelInfo,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    call_count: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Conversation>>>,
    metrics: Arc<ApiMetrics>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    /// Create a mock provider that answers "Mock response"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: ModelInfo::new("mock-model", "Mock Model", 4000),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(vec![])),
            metrics: Arc::new(ApiMetrics::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Answer every request with `text`
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::text(text)])
    }

    /// Queue responses. They are returned in order and the last one repeats.
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = script;
        self
    }

    /// Number of requests made so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Conversations sent, in order
    pub fn recorded_conversations(&self) -> Vec<Conversation> {
        lock(&self.recorded).clone()
    }

    pub fn last_conversation(&self) -> Option<Conversation> {
        lock(&self.recorded).last().cloned()
    }

    /// Reset call count and recorded conversations
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        lock(&self.recorded).clear();
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::default()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl ApiProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> ModelInfo {
        self.model.clone()
    }

    fn metrics(&self) -> Arc<ApiMetrics> {
        self.metrics.clone()
    }

    async fn send_message(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let mut conversation = Conversation::new();
        conversation.add_user_message(prompt);
        let turn = stream::collect(self.send_conversation_streaming(
            &conversation,
            StreamOptions::default(),
        ))
        .await?;
        Ok(turn.text)
    }

    fn send_conversation_streaming(
        &self,
        conversation: &Conversation,
        options: StreamOptions,
    ) -> EventStream {
        lock(&self.recorded).push(conversation.clone());
        let events = self.next_response().into_events();
        stream::guarded(futures::stream::iter(events), self.metrics.clone(), options.cancel)
    }
}
