// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File write tool
//!
//! Creates a file or replaces its contents entirely.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{str_arg, u64_arg};
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for writing whole files
pub struct WriteToFileTool {
    files: Arc<dyn FileService>,
}

impl WriteToFileTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for WriteToFileTool {
    fn name(&self) -> &str {
        "write_to_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the specified path. Creates the file and any missing parent directories, or overwrites an existing file."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "The path of the file to write to", true)
            .string("content", "The complete content to write to the file", true)
            .integer("line_count", "The number of lines in the content", true)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Edit
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;
        let content = str_arg(&args, "content")?;
        let line_count = u64_arg(&args, "line_count")?;

        Ok(from_outcome(
            self.files.write_file(path, content).await,
            |success| json!({ "success": success, "path": path, "line_count": line_count }),
        ))
    }
}
