// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Regex search tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{opt_str_arg, str_arg};
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for searching file contents with a regex
pub struct SearchFilesTool {
    files: Arc<dyn FileService>,
}

impl SearchFilesTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search files in a directory with a regular expression. Returns matching lines grouped by file."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "The path of the directory to search in", true)
            .string("regex", "The regular expression pattern to search for", true)
            .string(
                "file_pattern",
                "Glob pattern to filter files (e.g., '*.ts' for TypeScript files)",
                false,
            )
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Read
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;
        let regex = str_arg(&args, "regex")?;
        let file_pattern = opt_str_arg(&args, "file_pattern").unwrap_or("*");

        Ok(from_outcome(
            self.files.search_files(path, regex, file_pattern).await,
            |results| {
                let matches: Vec<Value> = results
                    .into_iter()
                    .map(|(file, lines)| json!({ "file": file, "matches": lines }))
                    .collect();
                json!({ "count": matches.len(), "matches": matches })
            },
        ))
    }
}
