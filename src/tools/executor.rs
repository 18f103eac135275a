// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Resolves a tool by name, validates its arguments and runs it. Whatever
//! happens (unknown tool, bad arguments, an error or a panic inside the tool,
//! cancellation) the caller gets a `ToolResult` back, never an error.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ToolRegistry, ToolResult};

/// Tool executor that validates arguments and normalizes failures
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    /// Create a new executor
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute `name` with `args`
    pub async fn execute_tool(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            tracing::debug!(tool = name, "tool not found");
            return ToolResult::failure(format!("Tool not found: {}", name));
        };

        if !tool.validate_args(&args) {
            let message = tool
                .validation_error(&args)
                .unwrap_or_else(|| format!("Invalid arguments for tool: {}", name));
            tracing::debug!(tool = name, error = %message, "rejected tool arguments");
            return ToolResult::failure(message);
        }

        tracing::debug!(tool = name, "executing tool");
        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::failure(format!("Error executing tool: {}", e)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(tool = name, panic = %message, "tool panicked");
                ToolResult::failure(format!("Error executing tool: {}", message))
            }
        }
    }

    /// Execute `name` with arguments given as JSON text
    pub async fn execute_tool_from_string(&self, name: &str, args: &str) -> ToolResult {
        match serde_json::from_str::<Value>(args) {
            Ok(args) => self.execute_tool(name, args).await,
            Err(e) => ToolResult::failure(format!("Error parsing tool arguments: {}", e)),
        }
    }

    /// Execute `name`, giving up when `cancel` fires first
    pub async fn execute_tool_with_cancel(
        &self,
        name: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> ToolResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(tool = name, "tool execution cancelled");
                ToolResult::failure(format!("Tool execution cancelled: {}", name))
            }
            result = self.execute_tool(name, args) => result,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
