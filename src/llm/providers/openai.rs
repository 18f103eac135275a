// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI chat completions provider, including Azure OpenAI deployments

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::common::{
    build_http_client, provider_error, wire_messages, SseDecoder, SseEvent, ToolCallBuffer,
};
use crate::config::settings::{HttpConfig, OpenAiConfig};
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

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Model IDs with known display names
pub const OPENAI_MODELS: [&str; 3] = ["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Display name for an OpenAI model. OpenAI models never use prompt caching here.
pub fn openai_model_info(id: &str, max_tokens: u32) -> ModelInfo {
    let name = match id {
        "gpt-4" => "GPT-4",
        "gpt-4-turbo" => "GPT-4 Turbo",
        "gpt-3.5-turbo" => "GPT-3.5 Turbo",
        other => other,
    };
    ModelInfo::new(id, name, max_tokens)
}

/// Where requests go and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// `{base}/chat/completions` with a bearer token
    OpenAi { base_url: String },
    /// Deployment URL with an `api-key` header
    Azure { endpoint: String, api_version: String },
}

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    auth: ApiAuthentication,
    endpoint: Endpoint,
    model: ModelInfo,
    metrics: Arc<ApiMetrics>,
}

impl OpenAiProvider {
    /// Create a provider talking to api.openai.com
    pub fn new(api_key: impl Into<String>, model: &str) -> Self {
        Self {
            client: Client::new(),
            auth: ApiAuthentication::new(api_key),
            endpoint: Endpoint::OpenAi {
                base_url: OPENAI_BASE_URL.to_string(),
            },
            model: openai_model_info(model, DEFAULT_MAX_TOKENS),
            metrics: Arc::new(ApiMetrics::new()),
        }
    }

    /// Create a provider for an Azure OpenAI deployment. `model` is the deployment name.
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: &str,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Endpoint::Azure {
                endpoint: endpoint.into(),
                api_version: api_version.into(),
            },
            ..Self::new(api_key, model)
        }
    }

    /// Create a provider from settings
    pub fn from_config(
        config: &OpenAiConfig,
        api_key: impl Into<String>,
        http: &HttpConfig,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let mut provider = if config.azure {
            let endpoint = config.base_url.clone().ok_or_else(|| {
                AgentError::Config(
                    "Azure OpenAI requires providers.openai.base_url to be set".to_string(),
                )
            })?;
            Self::azure(api_key, endpoint, &config.model, &config.azure_api_version)
        } else {
            let provider = Self::new(api_key, &config.model);
            match &config.base_url {
                Some(base_url) => provider.with_base_url(base_url.clone()),
                None => provider,
            }
        };
        provider.client = build_http_client(http)?;
        Ok(provider.with_max_tokens(config.max_tokens))
    }

    /// Use a custom base URL (the part before `/chat/completions`)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint = Endpoint::OpenAi {
            base_url: base_url.into(),
        };
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.model.max_tokens = max_tokens;
        self
    }

    pub fn is_azure(&self) -> bool {
        matches!(self.endpoint, Endpoint::Azure { .. })
    }

    fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                self.model.id,
                api_version
            ),
        }
    }

    fn convert_message(message: &Message) -> OpenAiMessage {
        match message.role {
            Role::Tool => OpenAiMessage {
                role: "tool",
                content: Some(message.content.clone()),
                tool_calls: None,
                tool_call_id: message.wire_tool_use_id().map(str::to_string),
            },
            Role::Assistant => {
                let calls = recorded_tool_calls(message);
                let tool_calls = (!calls.is_empty()).then(|| {
                    calls
                        .into_iter()
                        .map(|call| OpenAiToolCall {
                            id: call.id,
                            kind: "function",
                            function: OpenAiFunctionCall {
                                name: call.name,
                                arguments: call.input.to_string(),
                            },
                        })
                        .collect()
                });
                OpenAiMessage {
                    role: "assistant",
                    content: Some(message.content.clone()),
                    tool_calls,
                    tool_call_id: None,
                }
            }
            Role::System | Role::User => OpenAiMessage {
                role: message.role.as_str(),
                content: Some(message.content.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
        }
    }

    fn convert_tools(tools: &[ToolDescriptor]) -> Option<Vec<Value>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema.to_json_schema(),
                        }
                    })
                })
                .collect(),
        )
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolDescriptor]) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.id.clone(),
            max_tokens: self.model.max_tokens,
            messages: wire_messages(conversation)
                .into_iter()
                .map(Self::convert_message)
                .collect(),
            stream: Some(true),
            tools: Self::convert_tools(tools),
        }
    }

    /// POST with credentials. Fails before any I/O when no key is set.
    fn post(&self, body: &impl Serialize) -> Result<RequestBuilder> {
        let request = self
            .client
            .post(self.completions_url())
            .header("content-type", "application/json");
        let request = match self.endpoint {
            Endpoint::Azure { .. } => request.header("api-key", self.auth.api_key()?),
            Endpoint::OpenAi { .. } => self.auth.apply(request)?,
        };
        Ok(request.json(body))
    }
}

#[async_trait]
impl ApiProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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

        tracing::debug!(model = %self.model.id, azure = self.is_azure(), "sending OpenAI message");
        let start = Utc::now();
        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(provider_error(status.as_u16(), &text));
            }
            Ok(serde_json::from_str::<Value>(&text)?)
        }
        .await;

        let (input_tokens, output_tokens) = result
            .as_ref()
            .map(|v| {
                (
                    v["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
                    v["usage"]["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();
        self.metrics
            .record_request(start, Utc::now(), result.is_ok(), input_tokens, output_tokens);

        result?["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AgentError::malformed("OpenAI response has no message content"))
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

            tracing::debug!(model = %model, messages = message_count, "streaming OpenAI conversation");
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
            let mut state = OpenAiStreamState::default();

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

/// Decoding state for one chat completions stream
#[derive(Debug, Default)]
struct OpenAiStreamState {
    tools: ToolCallBuffer,
    usage: Option<(u64, u64)>,
}

impl OpenAiStreamState {
    fn on_event(&mut self, sse: &SseEvent) -> Vec<StreamEvent> {
        match self.decode(sse) {
            Ok(events) => events,
            Err(error) => vec![StreamEvent::Error(error)],
        }
    }

    fn decode(&mut self, sse: &SseEvent) -> Result<Vec<StreamEvent>> {
        let data = sse.data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        if data == "[DONE]" {
            for call in self.tools.finish_all() {
                events.push(call?);
            }
            if let Some((input_tokens, output_tokens)) = self.usage {
                events.push(StreamEvent::Usage {
                    input_tokens,
                    output_tokens,
                });
            }
            events.push(StreamEvent::Complete);
            return Ok(events);
        }

        let chunk: OpenAiStreamChunk = serde_json::from_str(data)
            .map_err(|e| AgentError::malformed(format!("Invalid OpenAI stream chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(AgentError::Provider {
                status: None,
                message: error.message,
            });
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some((usage.prompt_tokens, usage.completion_tokens));
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextChunk(text));
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let index = call.index.unwrap_or(0);
                let function = call.function.unwrap_or_default();
                self.tools
                    .start(index, call.id.as_deref(), function.name.as_deref());
                if let Some(arguments) = function.arguments {
                    self.tools.append(index, &arguments);
                }
            }
            if choice.finish_reason.is_some() {
                for call in self.tools.finish_all() {
                    events.push(call?);
                }
            }
        }
        Ok(events)
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    index: Option<u64>,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::TOOL_CALLS_METADATA;

    fn data(value: Value) -> SseEvent {
        SseEvent {
            event: None,
            data: value.to_string(),
        }
    }

    fn done() -> SseEvent {
        SseEvent {
            event: None,
            data: "[DONE]".into(),
        }
    }

    #[test]
    fn test_model_info() {
        assert_eq!(openai_model_info("gpt-4", 4000).name, "GPT-4");
        assert_eq!(openai_model_info("gpt-4-turbo", 4000).name, "GPT-4 Turbo");
        assert_eq!(openai_model_info("gpt-3.5-turbo", 4000).name, "GPT-3.5 Turbo");
        assert_eq!(openai_model_info("o-custom", 4000).name, "o-custom");
        for id in OPENAI_MODELS {
            assert!(!openai_model_info(id, 1).supports_prompt_caching);
        }
    }

    #[test]
    fn test_urls() {
        let provider = OpenAiProvider::new("k", "gpt-4");
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let azure = OpenAiProvider::azure("k", "https://res.openai.azure.com/", "my-gpt4", "2023-05-15");
        assert!(azure.is_azure());
        assert_eq!(
            azure.completions_url(),
            "https://res.openai.azure.com/openai/deployments/my-gpt4/chat/completions?api-version=2023-05-15"
        );
    }

    #[test]
    fn test_from_config_azure_requires_endpoint() {
        let config = OpenAiConfig {
            azure: true,
            ..OpenAiConfig::default()
        };
        let err = OpenAiProvider::from_config(&config, "k", &HttpConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Config(_)));

        let config = OpenAiConfig {
            azure: true,
            base_url: Some("https://res.openai.azure.com".into()),
            max_tokens: 512,
            ..OpenAiConfig::default()
        };
        let provider = OpenAiProvider::from_config(&config, "k", &HttpConfig::default()).unwrap();
        assert!(provider.is_azure());
        assert_eq!(provider.model().max_tokens, 512);
        assert!(provider.completions_url().contains("api-version=2023-05-15"));
    }

    #[test]
    fn test_request_messages() {
        let provider = OpenAiProvider::new("k", "gpt-4");
        let mut conversation = Conversation::with_system_message("sys");
        conversation.add_user_message("hi");
        conversation.add_message(Message::assistant("").with_metadata(
            TOOL_CALLS_METADATA,
            json!([{"id": "call_1", "name": "list_files", "input": {"path": "."}}]),
        ));
        conversation.add_message(
            Message::tool("list_files", json!({"path": "."}), json!({"success": true}))
                .with_tool_use_id("call_1"),
        );

        let body = serde_json::to_value(provider.build_request(&conversation, &[])).unwrap();
        let messages = &body["messages"];
        assert_eq!(messages[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(messages[1], json!({"role": "user", "content": "hi"}));
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["tool_calls"][0]["type"], "function");
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            "{\"path\":\".\"}"
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(messages[3]["content"], "{\"success\":true}");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_tool_call_id_falls_back_to_tool_name() {
        let message = OpenAiProvider::convert_message(&Message::tool(
            "read_file",
            json!({}),
            json!({"success": false, "error": "nope"}),
        ));
        assert_eq!(message.tool_call_id.as_deref(), Some("read_file"));
    }

    #[test]
    fn test_stream_state_text_tools_usage() {
        let mut state = OpenAiStreamState::default();
        let mut events = Vec::new();
        for event in [
            data(json!({"choices": [{"delta": {"role": "assistant", "content": ""}}]})),
            data(json!({"choices": [{"delta": {"content": "Hel"}}]})),
            data(json!({"choices": [{"delta": {"content": "lo"}}]})),
            data(json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "read_file", "arguments": ""}}]}}]})),
            data(json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"path\": \"a\"}"}}]}}]})),
            data(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]})),
            data(json!({"choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 4}})),
            done(),
        ] {
            events.extend(state.on_event(&event));
        }

        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], StreamEvent::TextChunk(t) if t == "Hel"));
        assert!(matches!(&events[1], StreamEvent::TextChunk(t) if t == "lo"));
        match &events[2] {
            StreamEvent::ToolUse { id, name, input } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "read_file");
                assert_eq!(input, &json!({"path": "a"}));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events[3],
            StreamEvent::Usage {
                input_tokens: 9,
                output_tokens: 4
            }
        ));
        assert!(matches!(events[4], StreamEvent::Complete));
    }

    #[test]
    fn test_stream_state_error_chunk() {
        let mut state = OpenAiStreamState::default();
        let events = state.on_event(&data(json!({"error": {"message": "server had an error"}})));
        assert!(matches!(
            &events[0],
            StreamEvent::Error(AgentError::Provider { message, .. }) if message == "server had an error"
        ));
    }

    #[test]
    fn test_done_without_usage() {
        let mut state = OpenAiStreamState::default();
        let events = state.on_event(&done());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Complete));
    }

    #[tokio::test]
    async fn test_send_message_without_key_fails_fast() {
        let provider = OpenAiProvider::new("", "gpt-4").with_base_url("http://127.0.0.1:9");
        let err = provider.send_message("hi", 10).await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }
}
