// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shell command tool
//!
//! Runs a command through the command runner with a 60 second limit. A failing
//! command is still reported as a successful tool call whose payload carries
//! `success: false`, so the model sees the error text and can react to it.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::services::CommandRunner;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool for executing shell commands
pub struct ExecuteCommandTool {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl ExecuteCommandTool {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project directory and return its output."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("command", "The shell command to execute", true)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Command
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let command = str_arg(&args, "command")?;

        let content = match self.runner.run(command, self.timeout).await {
            Ok(output) => json!({ "command": command, "output": output, "success": true }),
            Err(e) => {
                tracing::debug!(command, error = %e, "command failed");
                json!({ "command": command, "error": e.to_string(), "success": false })
            }
        };
        Ok(ToolResult::success(content))
    }
}
