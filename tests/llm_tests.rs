// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agent_core::error::AgentError;
use agent_core::llm::conversation::Conversation;
use agent_core::llm::message::Message;
use agent_core::llm::provider::{recorded_tool_calls, ApiProvider, StreamEvent, StreamOptions};
use agent_core::llm::providers::{AnthropicProvider, OpenAiProvider};
use agent_core::llm::retry::RetryStrategy;
use agent_core::llm::stream;
use agent_core::tools::{SchemaBuilder, ToolDescriptor};

fn sse(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

fn openai_sse(chunks: &[Value]) -> String {
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn event_stream(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn anthropic_text_body() -> String {
    sse(&[
        (
            "message_start",
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 12, "output_tokens": 1}}}),
        ),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        ("ping", json!({"type": "ping"})),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hello"}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " world"}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        (
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 7}}),
        ),
        ("message_stop", json!({"type": "message_stop"})),
    ])
}

fn conversation() -> Conversation {
    let mut conversation = Conversation::with_system_message("You are helpful.");
    conversation.add_user_message("Say hello");
    conversation
}

fn read_file_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "read_file".to_string(),
        description: "Read a file".to_string(),
        input_schema: SchemaBuilder::new()
            .string("path", "File path", true)
            .build(),
    }
}

async fn request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests[0].body).unwrap()
}

// ==================== Anthropic ====================

#[tokio::test]
async fn test_anthropic_streams_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(header("anthropic-beta", "prompt-caching-2024-07-31"))
        .and(body_partial_json(json!({"stream": true, "max_tokens": 4000})))
        .respond_with(event_stream(anthropic_text_body()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    let events = provider.send_conversation_streaming(&conversation(), StreamOptions::default());
    let turn = stream::collect(events).await.unwrap();

    assert_eq!(turn.text, "Hello world");
    assert_eq!(turn.usage, Some((12, 7)));
    assert!(!turn.has_tool_calls());

    let metrics = provider.metrics();
    assert_eq!(metrics.successful_requests(), 1);
    assert_eq!(metrics.total_input_tokens(), 12);
    assert_eq!(metrics.total_output_tokens(), 7);

    let body = request_body(&server).await;
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(
        body["messages"][0]["content"][0]["cache_control"]["type"],
        "ephemeral"
    );
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn test_anthropic_without_caching_sends_plain_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(event_stream(anthropic_text_body()))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-sonnet-20240229")
        .with_base_url(server.uri());
    provider.send_conversation(&conversation()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("anthropic-beta").is_none());
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "You are helpful."},
            {"role": "user", "content": "Say hello"}
        ])
    );
}

#[tokio::test]
async fn test_anthropic_streams_tool_use() {
    let server = MockServer::start().await;
    let body = sse(&[
        (
            "message_start",
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 3, "output_tokens": 0}}}),
        ),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Reading."}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
        (
            "content_block_start",
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_01", "name": "read_file", "input": {}}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"path\":"}}),
        ),
        (
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": " \"src/main.rs\"}"}}),
        ),
        ("content_block_stop", json!({"type": "content_block_stop", "index": 1})),
        ("message_stop", json!({"type": "message_stop"})),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-5-sonnet-20241022")
        .with_base_url(server.uri());
    let options = StreamOptions::default().with_tools(vec![read_file_descriptor()]);
    let events: Vec<StreamEvent> = provider
        .send_conversation_streaming(&conversation(), options)
        .collect()
        .await;

    assert!(matches!(&events[0], StreamEvent::TextChunk(t) if t == "Reading."));
    match &events[1] {
        StreamEvent::ToolUse { id, name, input } => {
            assert_eq!(id, "toolu_01");
            assert_eq!(name, "read_file");
            assert_eq!(input, &json!({"path": "src/main.rs"}));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(events.last(), Some(StreamEvent::Complete)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let body = request_body(&server).await;
    assert_eq!(body["tools"][0]["name"], "read_file");
    assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["path"]));
}

#[tokio::test]
async fn test_anthropic_replays_tool_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(event_stream(anthropic_text_body()))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-sonnet-20240229")
        .with_base_url(server.uri());

    // Assistant message carrying a tool call, as the session stores it.
    let turn = stream::AssistantTurn {
        text: String::new(),
        tool_calls: vec![agent_core::llm::provider::ToolCall {
            id: "toolu_9".to_string(),
            name: "list_files".to_string(),
            input: json!({"path": "."}),
        }],
        usage: None,
    };
    let assistant = turn.into_message();
    assert_eq!(recorded_tool_calls(&assistant).len(), 1);

    let mut conversation = conversation();
    conversation.add_message(assistant);
    conversation.add_message(
        Message::tool(
            "list_files",
            json!({"path": "."}),
            json!({"success": true, "content": {"files": []}}),
        )
        .with_tool_use_id("toolu_9"),
    );
    provider.send_conversation(&conversation).await.unwrap();

    let body = request_body(&server).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[2]["content"][0]["type"], "tool_use");
    assert_eq!(messages[2]["content"][0]["id"], "toolu_9");
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["content"][0]["type"], "tool_result");
    assert_eq!(messages[3]["content"][0]["tool_use_id"], "toolu_9");
}

#[tokio::test]
async fn test_anthropic_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "type": "error",
            "error": {"type": "api_error", "message": "Internal server error"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    let err = provider
        .send_conversation(&conversation())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Provider { status: Some(500), .. }));
    assert_eq!(err.to_string(), "Provider error (HTTP 500): Internal server error");
    assert_eq!(provider.metrics().failed_requests(), 1);
}

#[tokio::test]
async fn test_anthropic_rejected_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("bad", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    let err = provider.send_message("hi", 10).await.unwrap_err();
    assert!(matches!(err, AgentError::Auth(ref m) if m.contains("invalid x-api-key")));
}

#[tokio::test]
async fn test_anthropic_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "k"))
        .and(body_partial_json(json!({
            "max_tokens": 50,
            "messages": [{"role": "user", "content": "ping"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "pong"}],
            "usage": {"input_tokens": 2, "output_tokens": 1}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-haiku-20240307")
        .with_base_url(server.uri());
    assert_eq!(provider.send_message("ping", 50).await.unwrap(), "pong");

    let body = request_body(&server).await;
    assert!(body.get("stream").is_none());
    assert_eq!(provider.metrics().total_output_tokens(), 1);
}

#[tokio::test]
async fn test_missing_key_makes_no_http_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let anthropic = AnthropicProvider::new("", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    assert!(matches!(
        anthropic.send_message("hi", 10).await,
        Err(AgentError::Auth(_))
    ));
    let events: Vec<StreamEvent> = anthropic
        .send_conversation_streaming(&conversation(), StreamOptions::default())
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::Error(AgentError::Auth(_))));

    let openai = OpenAiProvider::new("  ", "gpt-4").with_base_url(server.uri());
    assert!(matches!(
        openai.send_message("hi", 10).await,
        Err(AgentError::Auth(_))
    ));
    // `expect(0)` is verified when the server drops.
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream(anthropic_text_body()))
        .expect(0)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    let events = provider.send_conversation_streaming(&conversation(), StreamOptions::default());
    drop(events);
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(event_stream(anthropic_text_body()).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("k", "claude-3-opus-20240229")
        .with_base_url(server.uri());
    let cancel = CancellationToken::new();
    let events = provider.send_conversation_streaming(
        &conversation(),
        StreamOptions::default().with_cancel(cancel.clone()),
    );

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = stream::collect(events).await.unwrap_err();
    assert!(matches!(err, AgentError::Cancelled(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(provider.metrics().failed_requests(), 1);
}

#[tokio::test]
async fn test_retry_recovers_from_overload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "finally"}]
        })))
        .mount(&server)
        .await;

    let provider = Arc::new(
        AnthropicProvider::new("k", "claude-3-opus-20240229").with_base_url(server.uri()),
    );
    let retry = RetryStrategy::new(3, Duration::from_millis(5), 2.0, Duration::from_millis(20));
    let text = retry
        .execute(|| {
            let provider = provider.clone();
            async move { provider.send_message("hi", 10).await }
        })
        .await
        .unwrap();

    assert_eq!(text, "finally");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(provider.metrics().failed_requests(), 2);
    assert_eq!(provider.metrics().successful_requests(), 1);
}

// ==================== OpenAI ====================

#[tokio::test]
async fn test_openai_streams_text_tools_and_usage() {
    let server = MockServer::start().await;
    let body = openai_sse(&[
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Let me "}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "check."}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_abc", "type": "function", "function": {"name": "read_file", "arguments": ""}}]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"path\":\"a.txt\"}"}}]}}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 20, "completion_tokens": 9}}),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4", "stream": true})))
        .respond_with(event_stream(body))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("sk-test", "gpt-4").with_base_url(server.uri());
    let options = StreamOptions::default().with_tools(vec![read_file_descriptor()]);
    let turn = stream::collect(provider.send_conversation_streaming(&conversation(), options))
        .await
        .unwrap();

    assert_eq!(turn.text, "Let me check.");
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].id, "call_abc");
    assert_eq!(turn.tool_calls[0].input, json!({"path": "a.txt"}));
    assert_eq!(turn.usage, Some((20, 9)));

    let body = request_body(&server).await;
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "You are helpful."}));
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "read_file");
    assert_eq!(
        body["tools"][0]["function"]["parameters"]["required"],
        json!(["path"])
    );
}

#[tokio::test]
async fn test_openai_truncated_stream_is_an_error() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": "partial"}}]})
    );
    Mock::given(method("POST"))
        .respond_with(event_stream(body))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("k", "gpt-4").with_base_url(server.uri());
    let events: Vec<StreamEvent> = provider
        .send_conversation_streaming(&conversation(), StreamOptions::default())
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], StreamEvent::TextChunk(t) if t == "partial"));
    assert!(matches!(events[1], StreamEvent::Error(AgentError::Provider { .. })));
}

#[tokio::test]
async fn test_openai_send_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "pong"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("k", "gpt-3.5-turbo").with_base_url(server.uri());
    assert_eq!(provider.send_message("ping", 5).await.unwrap(), "pong");
    assert_eq!(provider.metrics().total_input_tokens(), 3);
}

#[tokio::test]
async fn test_azure_deployment_url_and_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/my-gpt4/chat/completions"))
        .and(query_param("api-version", "2023-05-15"))
        .and(header("api-key", "azure-key"))
        .respond_with(event_stream(openai_sse(&[
            json!({"choices": [{"delta": {"content": "hi"}}]}),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::azure("azure-key", server.uri(), "my-gpt4", "2023-05-15");
    let message = provider.send_conversation(&conversation()).await.unwrap();
    assert_eq!(message.content, "hi");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}
