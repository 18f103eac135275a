// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Follow-up question tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::UserPrompt;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool that asks the user a question and returns the answer
pub struct AskFollowupQuestionTool {
    prompt: Arc<dyn UserPrompt>,
}

impl AskFollowupQuestionTool {
    pub fn new(prompt: Arc<dyn UserPrompt>) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl Tool for AskFollowupQuestionTool {
    fn name(&self) -> &str {
        "ask_followup_question"
    }

    fn description(&self) -> &str {
        "Ask the user a question to gather information needed to complete the task."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string("question", "The question to ask the user", true)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Read
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let question = str_arg(&args, "question")?;
        Ok(from_outcome(self.prompt.ask(question).await, |answer| {
            json!({ "question": question, "answer": answer })
        }))
    }
}
