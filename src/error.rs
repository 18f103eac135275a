// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for agent-core
//!
//! One flat taxonomy shared by the tool layer and the provider layer. Tool
//! failures are turned into `ToolResult::Failure` at the executor boundary;
//! provider failures travel as `StreamEvent::Error` or `Err` values.

use thiserror::Error;

/// Main error type for agent-core operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Malformed or missing tool arguments. Never retried, never reaches the network.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown tool, mode or MCP server
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or malformed body from a provider
    #[error("Provider error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Provider {
        status: Option<u16>,
        message: String,
    },

    /// No rate-limit permit became available in time
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Work was aborted through a cancellation token
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for agent-core operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Build a provider error from an HTTP status and message.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        AgentError::Provider {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build a provider error for a response body that could not be understood.
    pub fn malformed(message: impl Into<String>) -> Self {
        AgentError::Provider {
            status: None,
            message: message.into(),
        }
    }

    /// Short lowercase name of the error category, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Validation(_) => "validation",
            AgentError::NotFound(_) => "not_found",
            AgentError::Auth(_) => "auth",
            AgentError::Network(_) => "network",
            AgentError::Provider { .. } => "provider",
            AgentError::RateLimitExceeded(_) => "rate_limit",
            AgentError::Cancelled(_) => "cancelled",
            AgentError::ToolExecution(_) => "tool",
            AgentError::Config(_) => "config",
            AgentError::InvalidInput(_) => "invalid_input",
            AgentError::Io(_) => "io",
            AgentError::Json(_) => "json",
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Network(format!("request timeout: {}", err))
        } else if err.is_connect() {
            AgentError::Network(format!("connection failed: {}", err))
        } else if let Some(status) = err.status() {
            AgentError::provider(status.as_u16(), err.to_string())
        } else if err.is_decode() {
            AgentError::malformed(format!("malformed response body: {}", err))
        } else {
            AgentError::Network(err.to_string())
        }
    }
}
