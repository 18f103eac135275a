// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! A `Message` is one chat turn. Tool turns carry the tool name, the input the
//! model supplied and the JSON result the executor produced, so providers can
//! map them onto their own tool-result envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AgentError;

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier for the message
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Text content of the message
    pub content: String,

    /// Role of the message sender
    pub role: Role,

    /// When the message was created
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Tool name if this is a tool message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Arguments the model passed to the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,

    /// Serialized `ToolResult` of the invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,

    /// Provider-assigned id of the tool call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt
    System,
    /// Tool result
    Tool,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            _ => Err(AgentError::InvalidInput(format!(
                "Unknown message role: {}",
                s
            ))),
        }
    }
}

impl Message {
    /// Create a message with an explicit role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
            tool_name: None,
            tool_input: None,
            tool_result: None,
            tool_use_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool message recording one tool invocation
    pub fn tool(
        tool_name: impl Into<String>,
        tool_input: serde_json::Value,
        tool_result: serde_json::Value,
    ) -> Self {
        let content = tool_result.to_string();
        Self {
            tool_name: Some(tool_name.into()),
            tool_input: Some(tool_input),
            tool_result: Some(tool_result),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Attach the provider's tool call id
    pub fn with_tool_use_id(mut self, id: impl Into<String>) -> Self {
        self.tool_use_id = Some(id.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Whether this message records a tool invocation
    pub fn is_tool_message(&self) -> bool {
        self.role == Role::Tool && self.tool_name.is_some()
    }

    /// Id sent to providers when answering a tool call
    pub fn wire_tool_use_id(&self) -> Option<&str> {
        self.tool_use_id.as_deref().or(self.tool_name.as_deref())
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.id.is_empty());
        assert!(Uuid::parse_str(&msg.id).is_ok());
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::system("s").role, Role::System);
    }

    #[test]
    fn test_tool_message() {
        let msg = Message::tool(
            "read_file",
            json!({"path": "a.txt"}),
            json!({"success": true, "content": {"content": "hi"}}),
        );
        assert!(msg.is_tool_message());
        assert_eq!(msg.tool_name.as_deref(), Some("read_file"));
        assert!(msg.content.contains("\"success\":true"));
        assert_eq!(msg.wire_tool_use_id(), Some("read_file"));

        let msg = msg.with_tool_use_id("toolu_1");
        assert_eq!(msg.wire_tool_use_id(), Some("toolu_1"));
    }

    #[test]
    fn test_tool_role_without_name_is_not_tool_message() {
        let msg = Message::new(Role::Tool, "orphan");
        assert!(!msg.is_tool_message());
    }

    #[test]
    fn test_equality_by_id() {
        let a = Message::user("one");
        let mut b = a.clone();
        b.content = "two".to_string();
        assert_eq!(a, b);
        assert_ne!(a, Message::user("one"));
    }

    #[test]
    fn test_role_from_str_case_insensitive() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);
    }

    #[test]
    fn test_role_from_str_unknown() {
        let err = "robot".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Unknown message role: robot"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("Hello").with_metadata("source", json!("cli"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["metadata"]["source"], "cli");
        assert!(value.get("toolName").is_none());

        let parsed: Message = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.content, "Hello");
    }

    #[test]
    fn test_message_deserialize_generates_id() {
        let msg: Message = serde_json::from_value(json!({
            "content": "hi",
            "role": "assistant"
        }))
        .unwrap();
        assert!(!msg.id.is_empty());
        assert_eq!(msg.role, Role::Assistant);
    }
}
