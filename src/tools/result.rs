// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool result envelope
//!
//! Every tool invocation ends in exactly one of two shapes:
//! `{"success": true, "content": ...}` or `{"success": false, "error": "..."}`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::Result;

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// Successful output
    Success(Value),
    /// Error output
    Failure(String),
}

impl ToolResult {
    /// Create a successful result from JSON content
    pub fn success(content: Value) -> Self {
        ToolResult::Success(content)
    }

    /// Create a successful result from plain text, wrapped as `{"text": ...}`
    pub fn success_text(text: impl Into<String>) -> Self {
        ToolResult::Success(json!({ "text": text.into() }))
    }

    /// Create an error result
    pub fn failure(message: impl Into<String>) -> Self {
        ToolResult::Failure(message.into())
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// Content of a successful result
    pub fn content(&self) -> Option<&Value> {
        match self {
            ToolResult::Success(content) => Some(content),
            ToolResult::Failure(_) => None,
        }
    }

    /// Message of a failed result
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Success(_) => None,
            ToolResult::Failure(message) => Some(message),
        }
    }

    /// Envelope as a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Success(content) => json!({ "success": true, "content": content }),
            ToolResult::Failure(error) => json!({ "success": false, "error": error }),
        }
    }
}

/// Turn the outcome of a capability call into a result, using `on_success`
/// to shape the success payload. Errors become failures carrying the error text.
pub fn from_outcome<T>(outcome: Result<T>, on_success: impl FnOnce(T) -> Value) -> ToolResult {
    match outcome {
        Ok(value) => ToolResult::Success(on_success(value)),
        Err(e) => ToolResult::Failure(e.to_string()),
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ToolResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            success: bool,
            #[serde(default)]
            content: Option<Value>,
            #[serde(default)]
            error: Option<String>,
        }

        let envelope = Envelope::deserialize(deserializer)?;
        if envelope.success {
            Ok(ToolResult::Success(envelope.content.unwrap_or(Value::Null)))
        } else {
            envelope
                .error
                .map(ToolResult::Failure)
                .ok_or_else(|| D::Error::custom("failed tool result without an error message"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    #[test]
    fn test_success_text_wraps_in_object() {
        let result = ToolResult::success_text("hi");
        assert!(result.is_success());
        assert_eq!(result.content(), Some(&json!({"text": "hi"})));
        assert_eq!(result.error_message(), None);
    }

    #[test]
    fn test_success_json_kept_as_is() {
        let result = ToolResult::success(json!({"content": "hi"}));
        assert_eq!(result.content(), Some(&json!({"content": "hi"})));
    }

    #[test]
    fn test_failure() {
        let result = ToolResult::failure("boom");
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("boom"));
        assert!(result.content().is_none());
    }

    #[test]
    fn test_to_json_shapes() {
        assert_eq!(
            ToolResult::success_text("ok").to_json(),
            json!({"success": true, "content": {"text": "ok"}})
        );
        assert_eq!(
            ToolResult::failure("bad").to_json(),
            json!({"success": false, "error": "bad"})
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        for result in [
            ToolResult::success(json!({"files": ["a", "b"], "count": 2})),
            ToolResult::failure("Tool not found: x"),
        ] {
            let text = serde_json::to_string(&result).unwrap();
            let parsed: ToolResult = serde_json::from_str(&text).unwrap();
            assert_eq!(parsed, result);
        }
    }

    #[test]
    fn test_deserialize_failure_without_error_is_rejected() {
        assert!(serde_json::from_str::<ToolResult>(r#"{"success": false}"#).is_err());
    }

    #[test]
    fn test_from_outcome() {
        let ok = from_outcome(Ok::<_, AgentError>("x".to_string()), |s| json!({ "v": s }));
        assert_eq!(ok, ToolResult::success(json!({"v": "x"})));

        let err = from_outcome(
            Err::<String, _>(AgentError::NotFound("missing.txt".into())),
            |s| json!(s),
        );
        assert_eq!(err.error_message(), Some("Not found: missing.txt"));
    }
}
