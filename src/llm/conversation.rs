// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation history
//!
//! Message order is wire order: providers send messages exactly as they were
//! appended. Every mutation refreshes `updated_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::message::{Message, Role};

/// An ordered chat history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: None,
            messages: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a conversation that starts with a system prompt
    pub fn with_system_message(system_prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.add_system_message(system_prompt);
        conversation
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Clock skew must never move updated_at backwards.
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Append a message
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Append a user message and return a reference to it
    pub fn add_user_message(&mut self, content: impl Into<String>) -> &Message {
        self.push_and_get(Message::user(content))
    }

    /// Append an assistant message and return a reference to it
    pub fn add_assistant_message(&mut self, content: impl Into<String>) -> &Message {
        self.push_and_get(Message::assistant(content))
    }

    /// Append a system message and return a reference to it
    pub fn add_system_message(&mut self, content: impl Into<String>) -> &Message {
        self.push_and_get(Message::system(content))
    }

    /// Append a tool message and return a reference to it
    pub fn add_tool_message(
        &mut self,
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        tool_result: serde_json::Value,
    ) -> &Message {
        self.push_and_get(Message::tool(tool_name, tool_input, tool_result))
    }

    fn push_and_get(&mut self, message: Message) -> &Message {
        self.add_message(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Most recent message
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages with the given role, in order
    pub fn messages_by_role(&self, role: Role) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.role == role).collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Set a metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
        self.touch();
    }

    /// Remove a metadata entry. `updated_at` only moves if the key existed.
    pub fn remove_metadata(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.metadata.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Drop every message
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.touch();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
        self.touch();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// A conversation shared between a session and its readers.
///
/// Appends go through the write lock, so concurrent tool results are
/// serialized. Readers take snapshots and never observe a half-applied append.
#[derive(Debug, Clone, Default)]
pub struct SharedConversation {
    inner: Arc<RwLock<Conversation>>,
}

impl SharedConversation {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            inner: Arc::new(RwLock::new(conversation)),
        }
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> Conversation {
        self.inner.read().await.clone()
    }

    /// Append one message
    pub async fn append(&self, message: Message) {
        self.inner.write().await.add_message(message);
    }

    /// Run a mutation under the writer lock
    pub async fn update<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// Number of messages
    pub async fn len(&self) -> usize {
        self.inner.read().await.message_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
