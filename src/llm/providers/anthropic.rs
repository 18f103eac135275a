// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API provider implementation
//!
//! Streams `POST {base}/v1/messages` and decodes Anthropic's server-sent
//! events into [`StreamEvent`]s.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::common::{
    build_http_client, provider_error, wire_messages, SseDecoder, SseEvent, ToolCallBuffer,
};
use crate::config::settings::{AnthropicConfig, HttpConfig};
use crate::error::{AgentError, Result};
use crate::llm::auth::ApiAuthentication;
use crate::llm::conversation::Conversation;
use crate::llm::message::{Message, Role};
use crate::llm::metrics::ApiMetrics;
use crate::llm::provider::{
    recorded_tool_calls, ApiProvider, EventStream, ModelInfo, StreamEvent, StreamOptions,
};
use crate::llm::stream;
use crate::tools::ToolDescriptor;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Model IDs with known display names
pub const ANTHROPIC_MODELS: [&str; 5] = [
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
];

/// Display name and caching support for a Claude model
pub fn anthropic_model_info(id: &str, max_tokens: u32) -> ModelInfo {
    let (name, caching) = match id {
        "claude-3-opus-20240229" => ("Claude 3 Opus", true),
        "claude-3-sonnet-20240229" => ("Claude 3 Sonnet", false),
        "claude-3-haiku-20240307" => ("Claude 3 Haiku", true),
        "claude-3-5-sonnet-20241022" => ("Claude 3.5 Sonnet", true),
        "claude-3-5-haiku-20241022" => ("Claude 3.5 Haiku", true),
        other => (other, false),
    };
    ModelInfo::new(id, name, max_tokens).with_prompt_caching(caching)
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    auth: ApiAuthentication,
    base_url: String,
    model: ModelInfo,
    prompt_caching: bool,
    metrics: Arc<ApiMetrics>,
}

impl AnthropicProvider {
    /// Create a provider for `model` with default HTTP settings
    pub fn new(api_key: impl Into<String>, model: &str) -> Self {
        Self {
            client: Client::new(),
            auth: ApiAuthentication::new(api_key),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model: anthropic_model_info(model, DEFAULT_MAX_TOKENS),
            prompt_caching: true,
            metrics: Arc::new(ApiMetrics::new()),
        }
    }

    /// Create a provider from settings
    pub fn from_config(
        config: &AnthropicConfig,
        api_key: impl Into<String>,
        http: &HttpConfig,
    ) -> Result<Self> {
        let mut provider = Self::new(api_key, &config.model)
            .with_max_tokens(config.max_tokens)
            .with_prompt_caching(config.enable_prompt_caching);
        provider.client = build_http_client(http)?;
        if let Some(base_url) = &config.base_url {
            provider.base_url = base_url.clone();
        }
        Ok(provider)
    }

    /// Use a custom base URL (without the `/v1/messages` suffix)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.model.max_tokens = max_tokens;
        self
    }

    pub fn with_prompt_caching(mut self, enabled: bool) -> Self {
        self.prompt_caching = enabled;
        self
    }

    fn caching_active(&self) -> bool {
        self.prompt_caching && self.model.supports_prompt_caching
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    /// Convert one message to Anthropic format
    fn convert_message(&self, message: &Message) -> AnthropicMessage {
        match message.role {
            Role::System | Role::User => AnthropicMessage {
                role: message.role.as_str(),
                content: if self.caching_active() {
                    AnthropicContent::Blocks(vec![AnthropicContentBlock::Text {
                        text: message.content.clone(),
                        cache_control: Some(CacheControl::ephemeral()),
                    }])
                } else {
                    AnthropicContent::Text(message.content.clone())
                },
            },
            Role::Assistant => {
                let calls = recorded_tool_calls(message);
                let content = if calls.is_empty() {
                    AnthropicContent::Text(message.content.clone())
                } else {
                    let text = (!message.content.is_empty()).then(|| AnthropicContentBlock::Text {
                        text: message.content.clone(),
                        cache_control: None,
                    });
                    AnthropicContent::Blocks(
                        text.into_iter()
                            .chain(calls.into_iter().map(|call| AnthropicContentBlock::ToolUse {
                                id: call.id,
                                name: call.name,
                                input: call.input,
                            }))
                            .collect(),
                    )
                };
                AnthropicMessage {
                    role: "assistant",
                    content,
                }
            }
            Role::Tool => AnthropicMessage {
                role: "tool",
                content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                    tool_use_id: message.wire_tool_use_id().unwrap_or_default().to_string(),
                    content: message.content.clone(),
                }]),
            },
        }
    }

    fn convert_tools(tools: &[ToolDescriptor]) -> Option<Vec<AnthropicTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.input_schema.to_json_schema(),
                })
                .collect(),
        )
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolDescriptor]) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.id.clone(),
            max_tokens: self.model.max_tokens,
            messages: wire_messages(conversation)
                .into_iter()
                .map(|m| self.convert_message(m))
                .collect(),
            stream: Some(true),
            tools: Self::convert_tools(tools),
        }
    }

    /// POST with credentials and version headers. Fails before any I/O when no key is set.
    fn post(&self, body: &impl Serialize) -> Result<RequestBuilder> {
        let api_key = self.auth.api_key()?;
        let mut request = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        if self.caching_active() {
            request = request.header("anthropic-beta", PROMPT_CACHING_BETA);
        }
        Ok(request.json(body))
    }
}

#[async_trait]
impl ApiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> ModelInfo {
        self.model.clone()
    }

    fn metrics(&self) -> Arc<ApiMetrics> {
        self.metrics.clone()
    }

    async fn send_message(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.model.id,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let request = self.post(&body)?;

        tracing::debug!(model = %self.model.id, "sending Anthropic message");
        let start = Utc::now();
        let result = send_json(request).await;

        let (input_tokens, output_tokens) = result
            .as_ref()
            .map(|v| {
                (
                    v["usage"]["input_tokens"].as_u64().unwrap_or(0),
                    v["usage"]["output_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();
        self.metrics
            .record_request(start, Utc::now(), result.is_ok(), input_tokens, output_tokens);

        result?["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::malformed("Anthropic response has no text content"))
    }

    fn send_conversation_streaming(
        &self,
        conversation: &Conversation,
        options: StreamOptions,
    ) -> EventStream {
        let body = self.build_request(conversation, &options.tools);
        let request = self.post(&body);
        let model = self.model.id.clone();
        let message_count = body.messages.len();

        let raw = async_stream::stream! {
            let request = match request {
                Ok(request) => request,
                Err(error) => {
                    yield StreamEvent::Error(error);
                    return;
                }
            };

            tracing::debug!(model = %model, messages = message_count, "streaming Anthropic conversation");
            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    yield StreamEvent::Error(error.into());
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                yield StreamEvent::Error(provider_error(status.as_u16(), &text));
                return;
            }

            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut state = AnthropicStreamState::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        yield StreamEvent::Error(error.into());
                        return;
                    }
                };
                for sse in decoder.push(&chunk) {
                    for event in state.on_event(&sse) {
                        let done = event.is_terminal();
                        yield event;
                        if done {
                            return;
                        }
                    }
                }
            }
            if let Some(sse) = decoder.finish() {
                for event in state.on_event(&sse) {
                    let done = event.is_terminal();
                    yield event;
                    if done {
                        return;
                    }
                }
            }
        };

        stream::guarded(raw, self.metrics.clone(), options.cancel)
    }
}

async fn send_json(request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(provider_error(status.as_u16(), &text));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Decoding state for one Anthropic event stream
#[derive(Debug, Default)]
struct AnthropicStreamState {
    tools: ToolCallBuffer,
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicStreamState {
    /// Events produced by one SSE event. Failures come back as a terminal `Error`.
    fn on_event(&mut self, sse: &SseEvent) -> Vec<StreamEvent> {
        match self.decode(sse) {
            Ok(events) => events,
            Err(error) => vec![StreamEvent::Error(error)],
        }
    }

    fn decode(&mut self, sse: &SseEvent) -> Result<Vec<StreamEvent>> {
        let data: Value = if sse.data.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&sse.data).map_err(|e| {
                AgentError::malformed(format!("Invalid Anthropic event payload: {}", e))
            })?
        };
        let kind = sse
            .event
            .clone()
            .or_else(|| data["type"].as_str().map(str::to_string))
            .unwrap_or_default();
        let index = data["index"].as_u64().unwrap_or(0);

        let mut events = Vec::new();
        match kind.as_str() {
            "message_start" => {
                let usage = &data["message"]["usage"];
                self.input_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
                self.output_tokens = usage["output_tokens"].as_u64().unwrap_or(0);
            }
            "content_block_start" => {
                let block = &data["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => {
                        self.tools
                            .start(index, block["id"].as_str(), block["name"].as_str());
                    }
                    Some("text") => {
                        if let Some(text) = block["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(StreamEvent::TextChunk(text.to_string()));
                        }
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let delta = &data["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str().filter(|t| !t.is_empty()) {
                            events.push(StreamEvent::TextChunk(text.to_string()));
                        }
                    }
                    Some("input_json_delta") => {
                        self.tools
                            .append(index, delta["partial_json"].as_str().unwrap_or_default());
                    }
                    _ => {}
                }
            }
            "content_block_stop" => {
                if let Some(call) = self.tools.finish(index) {
                    events.push(call?);
                }
            }
            "message_delta" => {
                if let Some(output) = data["usage"]["output_tokens"].as_u64() {
                    self.output_tokens = output;
                }
            }
            "message_stop" => {
                for call in self.tools.finish_all() {
                    events.push(call?);
                }
                events.push(StreamEvent::Usage {
                    input_tokens: self.input_tokens,
                    output_tokens: self.output_tokens,
                });
                events.push(StreamEvent::Complete);
            }
            "ping" => {}
            "error" => {
                let error = &data["error"];
                return Err(AgentError::Provider {
                    status: None,
                    message: format!(
                        "{}: {}",
                        error["type"].as_str().unwrap_or("error"),
                        error["message"].as_str().unwrap_or("unknown error")
                    ),
                });
            }
            other => tracing::debug!(event = other, "ignoring unknown Anthropic event"),
        }
        Ok(events)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl CacheControl {
    fn ephemeral() -> Self {
        Self { kind: "ephemeral" }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}
