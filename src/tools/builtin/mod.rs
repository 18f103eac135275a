// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for agent-core

mod ask;
mod browser;
mod code_definitions;
mod completion;
mod file_edit;
mod file_read;
mod file_write;
mod grep;
mod list_files;
mod shell;

pub use ask::AskFollowupQuestionTool;
pub use browser::BrowserActionTool;
pub use code_definitions::ListCodeDefinitionsTool;
pub use completion::AttemptCompletionTool;
pub use file_edit::ApplyDiffTool;
pub use file_read::ReadFileTool;
pub use file_write::WriteToFileTool;
pub use grep::SearchFilesTool;
pub use list_files::ListFilesTool;
pub use shell::ExecuteCommandTool;

use serde_json::Value;

use crate::error::{AgentError, Result};

/// Required string argument
pub(crate) fn str_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::Validation(format!("Missing required parameter: {}", name)))
}

/// Optional string argument
pub(crate) fn opt_str_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

/// Required non-negative integer argument
pub(crate) fn u64_arg(args: &Value, name: &str) -> Result<u64> {
    args.get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| AgentError::Validation(format!("Missing required parameter: {}", name)))
}
