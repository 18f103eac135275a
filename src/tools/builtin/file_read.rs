// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File read tool
//!
//! Reads contents of a file through the file service.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for reading file contents
pub struct ReadFileTool {
    files: Arc<dyn FileService>,
}

impl ReadFileTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the specified path."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string(
                "path",
                "The path of the file to read (absolute or relative to the project root)",
                true,
            )
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Read
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;
        Ok(from_outcome(self.files.read_file(path).await, |content| {
            json!({ "content": content })
        }))
    }
}
