// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task completion tool
//!
//! Reports the final result of a task, optionally running a command that
//! demonstrates it (for example starting a dev server).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{opt_str_arg, str_arg};
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::services::CommandRunner;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

const DEMO_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Tool the model calls when it believes the task is done
pub struct AttemptCompletionTool {
    runner: Arc<dyn CommandRunner>,
}

impl AttemptCompletionTool {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for AttemptCompletionTool {
    fn name(&self) -> &str {
        "attempt_completion"
    }

    fn description(&self) -> &str {
        "Present the result of the task to the user, optionally with a command that demonstrates it."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("result", "Description of the completed work", true)
            .string("command", "Optional command that demonstrates the result", false)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Command
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let result = str_arg(&args, "result")?;

        let content = match opt_str_arg(&args, "command").filter(|c| !c.trim().is_empty()) {
            None => json!({ "result": result, "success": true }),
            Some(command) => match self.runner.run(command, DEMO_COMMAND_TIMEOUT).await {
                Ok(output) => json!({
                    "result": result,
                    "command": command,
                    "output": output,
                    "success": true,
                }),
                Err(e) => json!({
                    "result": result,
                    "command": command,
                    "error": e.to_string(),
                    "success": false,
                }),
            },
        };
        Ok(ToolResult::success(content))
    }
}
