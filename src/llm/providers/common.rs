// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::settings::HttpConfig;
use crate::error::{AgentError, Result};
use crate::llm::conversation::Conversation;
use crate::llm::message::{Message, Role};
use crate::llm::provider::StreamEvent;

/// Build the HTTP client shared by a provider's requests.
pub(crate) fn build_http_client(http: &HttpConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .read_timeout(Duration::from_secs(http.read_timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a non-2xx response to an error.
///
/// The message is taken from `error.message` when the body is a JSON error
/// envelope, otherwise the raw body is used.
pub(crate) fn provider_error(status: u16, body: &str) -> AgentError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error").and_then(|e| {
                e.get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| e.as_str())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => AgentError::Auth(format!("HTTP {}: {}", status, message)),
        _ => AgentError::provider(status, message),
    }
}

/// Messages in the order they go on the wire: the first system message leads,
/// any further system messages are dropped.
pub(crate) fn wire_messages(conversation: &Conversation) -> Vec<&Message> {
    let messages = conversation.messages();
    let system = messages.iter().find(|m| m.role == Role::System);
    system
        .into_iter()
        .chain(messages.iter().filter(|m| m.role != Role::System))
        .collect()
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental server-sent-events decoder.
///
/// Bytes arrive in arbitrary chunks, possibly splitting a UTF-8 sequence;
/// complete events are returned once their terminating blank line has been seen.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);

            if line.is_empty() {
                if let Some(event) = self.take_event() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    /// Event left over when the body ends without a trailing blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            self.push(b"\n");
        }
        self.take_event()
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        let event = SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        };
        Some(event)
    }
}

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Assembles tool calls whose JSON input arrives in fragments, keyed by the
/// provider's block or call index.
#[derive(Debug, Default)]
pub(crate) struct ToolCallBuffer {
    pending: BTreeMap<u64, PendingCall>,
}

impl ToolCallBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a call, or fill in id and name on one that is already open.
    pub fn start(&mut self, index: u64, id: Option<&str>, name: Option<&str>) {
        let call = self.pending.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = id.to_string();
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            call.name = name.to_string();
        }
    }

    pub fn append(&mut self, index: u64, fragment: &str) {
        self.pending
            .entry(index)
            .or_default()
            .arguments
            .push_str(fragment);
    }

    pub fn contains(&self, index: u64) -> bool {
        self.pending.contains_key(&index)
    }

    /// Close one call and turn it into a `ToolUse` event.
    pub fn finish(&mut self, index: u64) -> Option<Result<StreamEvent>> {
        self.pending
            .remove(&index)
            .map(|call| Self::into_event(index, call))
    }

    /// Close every open call in index order.
    pub fn finish_all(&mut self) -> Vec<Result<StreamEvent>> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(index, call)| Self::into_event(index, call))
            .collect()
    }

    fn into_event(index: u64, call: PendingCall) -> Result<StreamEvent> {
        let input = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| {
                AgentError::malformed(format!(
                    "Invalid input JSON for tool call '{}': {}",
                    call.name, e
                ))
            })?
        };
        let id = if call.id.is_empty() {
            format!("call_{}", index)
        } else {
            call.id
        };
        Ok(StreamEvent::ToolUse {
            id,
            name: call.name,
            input,
        })
    }
}
