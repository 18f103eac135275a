// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Code definition listing tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::FileService;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool listing the top-level definitions of source files in a directory
pub struct ListCodeDefinitionsTool {
    files: Arc<dyn FileService>,
}

impl ListCodeDefinitionsTool {
    pub fn new(files: Arc<dyn FileService>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Tool for ListCodeDefinitionsTool {
    fn name(&self) -> &str {
        "list_code_definition_names"
    }

    fn description(&self) -> &str {
        "List definition names (functions, types, classes) in the source files at the top level of a directory."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("path", "The path of the directory or file to inspect", true)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Read
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let path = str_arg(&args, "path")?;

        Ok(from_outcome(
            self.files.list_code_definitions(path).await,
            |definitions| {
                let files: Vec<Value> = definitions
                    .into_iter()
                    .map(|(file, names)| json!({ "file": file, "definitions": names }))
                    .collect();
                json!({ "count": files.len(), "files": files, "path": path })
            },
        ))
    }
}
