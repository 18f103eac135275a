// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! API provider trait and streaming protocol types
//!
//! A provider turns a [`Conversation`] into its wire request and answers with a
//! lazy [`EventStream`]. Every stream carries zero or more text chunks and tool
//! requests, at most one usage report, and ends with exactly one terminal
//! event: [`StreamEvent::Complete`] or [`StreamEvent::Error`].

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::llm::conversation::Conversation;
use crate::llm::message::Message;
use crate::llm::metrics::ApiMetrics;
use crate::llm::stream;
use crate::tools::ToolDescriptor;

/// Metadata key under which an assistant message stores the tool calls it made
pub const TOOL_CALLS_METADATA: &str = "tool_calls";

/// Information about the model a provider talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model ID sent on the wire
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Maximum tokens requested per response
    pub max_tokens: u32,
    /// Whether the model accepts cache-control markers
    pub supports_prompt_caching: bool,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_tokens,
            supports_prompt_caching: false,
        }
    }

    pub fn with_prompt_caching(mut self, supported: bool) -> Self {
        self.supports_prompt_caching = supported;
        self
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Tool calls stored on an assistant message, empty when there are none
pub fn recorded_tool_calls(message: &Message) -> Vec<ToolCall> {
    message
        .metadata
        .get(TOOL_CALLS_METADATA)
        .and_then(|calls| serde_json::from_value(calls.clone()).ok())
        .unwrap_or_default()
}

/// Events from a streaming response
#[derive(Debug)]
pub enum StreamEvent {
    /// A piece of assistant text
    TextChunk(String),

    /// The model asks for a tool to be run
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Token counts for the whole request
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },

    /// Terminal: the response finished normally
    Complete,

    /// Terminal: the response failed
    Error(AgentError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error(_))
    }
}

/// Lazy stream of events for one request
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Per-request options for a streaming call
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Tools the model may call. Omitted from the request when empty.
    pub tools: Vec<ToolDescriptor>,
    /// Fires to abort the request
    pub cancel: CancellationToken,
}

impl StreamOptions {
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Main trait for LLM API providers
#[async_trait]
pub trait ApiProvider: Send + Sync {
    /// Provider name (e.g. "anthropic", "openai")
    fn name(&self) -> &str;

    /// The model requests are sent to
    fn model(&self) -> ModelInfo;

    /// Request counters for this provider
    fn metrics(&self) -> Arc<ApiMetrics>;

    /// Single-shot completion of one user prompt.
    ///
    /// Fails with [`AgentError::Auth`] before any network call when no
    /// credential is configured.
    async fn send_message(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Stream a response to the conversation.
    ///
    /// Nothing is sent until the returned stream is first polled.
    fn send_conversation_streaming(
        &self,
        conversation: &Conversation,
        options: StreamOptions,
    ) -> EventStream;

    /// Collect a streamed response into one assistant message.
    async fn send_conversation(&self, conversation: &Conversation) -> Result<Message> {
        let events = self.send_conversation_streaming(conversation, StreamOptions::default());
        let turn = stream::collect(events).await?;
        Ok(turn.into_message())
    }
}
