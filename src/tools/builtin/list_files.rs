// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directory listing tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for listing files in a directory
pub struct ListFilesTool {
    files: Arc<dyn FileService>,
}

impl ListFilesTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in a directory. Directories end with '/'. Hidden and dependency directories are skipped."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "The path of the directory to list", true)
            .boolean("recursive", "Whether to list files recursively", false)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Read
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;
        let recursive = args
            .get("recursive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(from_outcome(
            self.files.list_files(path, recursive).await,
            |files| {
                json!({
                    "count": files.len(),
                    "files": files,
                    "path": path,
                    "recursive": recursive,
                })
            },
        ))
    }
}
