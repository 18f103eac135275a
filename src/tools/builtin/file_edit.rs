// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line-range edit tool
//!
//! Replaces lines `start_line..=end_line` of a file with new text.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{str_arg, u64_arg};
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for replacing a range of lines in a file
pub struct ApplyDiffTool {
    files: Arc<dyn FileService>,
}

impl ApplyDiffTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for ApplyDiffTool {
    fn name(&self) -> &str {
        "apply_diff"
    }

    fn description(&self) -> &str {
        "Replace a range of lines in an existing file with new content."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "The path of the file to modify", true)
            .string("diff", "The text that replaces the line range", true)
            .integer("start_line", "First line to replace (1-based)", true)
            .integer("end_line", "Last line to replace (1-based, inclusive)", true)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Edit
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;
        let diff = str_arg(&args, "diff")?;
        let start_line = u64_arg(&args, "start_line")?;
        let end_line = u64_arg(&args, "end_line")?;

        Ok(from_outcome(
            self.files.apply_diff(path, diff, start_line, end_line).await,
            |success| {
                json!({
                    "success": success,
                    "path": path,
                    "start_line": start_line,
                    "end_line": end_line,
                })
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::services::LocalFileService;
    use tempfile::TempDir;

    fn tool(temp: &TempDir) -> ApplyDiffTool {
        ApplyDiffTool::new(Arc::new(LocalFileService::new(temp.path())))
    }

    #[tokio::test]
    async fn test_replaces_line_range() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.rs"), "fn a() {}\nfn b() {}\nfn c() {}\n").unwrap();

        let result = tool(&temp)
            .execute(json!({"path": "a.rs", "diff": "fn b2() {}", "start_line": 2, "end_line": 2}))
            .await
            .unwrap();

        assert_eq!(
            result,
            ToolResult::success(json!({"success": true, "path": "a.rs", "start_line": 2, "end_line": 2}))
        );
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.rs")).unwrap(),
            "fn a() {}\nfn b2() {}\nfn c() {}\n"
        );
    }

    #[tokio::test]
    async fn test_bad_range_fails_at_execution() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "one\ntwo\n").unwrap();
        let tool = tool(&temp);

        let zero = json!({"path": "a.txt", "diff": "x", "start_line": 0, "end_line": 1});
        assert_eq!(tool.validation_error(&zero), None);
        assert!(tool.validate_args(&zero));
        let result = tool.execute(zero).await.unwrap();
        assert_eq!(
            result.error_message(),
            Some("Validation error: Invalid line range 0-1 for a file with 2 lines")
        );

        let inverted = json!({"path": "a.txt", "diff": "x", "start_line": 2, "end_line": 1});
        assert!(tool.validate_args(&inverted));
        assert!(!tool.execute(inverted).await.unwrap().is_success());
        assert_eq!(
            std::fs::read_to_string(temp.path().join("a.txt")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_failure() {
        let temp = TempDir::new().unwrap();
        let result = tool(&temp)
            .execute(json!({"path": "none.rs", "diff": "x", "start_line": 1, "end_line": 1}))
            .await
            .unwrap();
        assert!(result.error_message().unwrap().contains("File not found"));
    }
}
