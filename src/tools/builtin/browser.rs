// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Browser action tool
//!
//! Drives a [`BrowserSession`]: launch a page, click, type, scroll, close.
//! Each action except `close` answers with a screenshot of the page.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::str_arg;
use crate::error::Result;
use crate::modes::ToolGroup;
use crate::tools::result::from_outcome;
use crate::tools::services::BrowserSession;
use crate::tools::{SchemaBuilder, Tool, ToolInputSchema, ToolResult};

/// Tool for interacting with a browser session
pub struct BrowserActionTool {
    browser: Arc<dyn BrowserSession>,
}

impl BrowserActionTool {
    pub fn new(browser: Arc<dyn BrowserSession>) -> Self {
        Self { browser }
    }
}

/// Parameter each action needs besides `action`
fn action_parameter(action: &str) -> Option<&'static str> {
    match action {
        "launch" => Some("url"),
        "click" => Some("coordinate"),
        "type" => Some("text"),
        _ => None,
    }
}

#[async_trait]
impl Tool for BrowserActionTool {
    fn name(&self) -> &str {
        "browser_action"
    }

    fn description(&self) -> &str {
        "Interact with a browser: launch a URL, click at a coordinate, type text, scroll, or close it. Returns a screenshot after each action."
    }

    fn input_schema(&self) -> ToolInputSchema {
        SchemaBuilder::new()
            .string(
                "action",
                "One of: launch, click, type, scroll_down, scroll_up, close",
                true,
            )
            .string("url", "URL to open (for 'launch')", false)
            .string("coordinate", "x,y position to click (for 'click')", false)
            .string("text", "Text to type (for 'type')", false)
            .build()
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Browser
    }

    fn validation_error(&self, args: &Value) -> Option<String> {
        let Some(object) = args.as_object() else {
            return Some("Arguments must be a JSON object".to_string());
        };
        let action = match object.get("action") {
            None => {
                return Some("Missing required parameter: action".to_string())
            }
            Some(Value::String(action)) => action.as_str(),
            Some(_) => return Some("Parameter 'action' must be a string".to_string()),
        };

        let param = action_parameter(action)?;
        match object.get(param) {
            None => Some(format!(
                "Missing required parameter for '{}' action: {}",
                action, param
            )),
            Some(Value::String(_)) => None,
            Some(_) => Some(format!("Parameter '{}' must be a string", param)),
        }
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let action = str_arg(&args, "action")?;

        let result = match action {
            "launch" => {
                let url = str_arg(&args, "url")?;
                from_outcome(self.browser.launch(url).await, |screenshot| {
                    json!({ "action": action, "url": url, "screenshot": screenshot, "success": true })
                })
            }
            "click" => {
                let coordinate = str_arg(&args, "coordinate")?;
                from_outcome(self.browser.click(coordinate).await, |screenshot| {
                    json!({ "action": action, "coordinate": coordinate, "screenshot": screenshot, "success": true })
                })
            }
            "type" => {
                let text = str_arg(&args, "text")?;
                from_outcome(self.browser.type_text(text).await, |screenshot| {
                    json!({ "action": action, "text": text, "screenshot": screenshot, "success": true })
                })
            }
            "scroll_down" => from_outcome(self.browser.scroll_down().await, |screenshot| {
                json!({ "action": action, "screenshot": screenshot, "success": true })
            }),
            "scroll_up" => from_outcome(self.browser.scroll_up().await, |screenshot| {
                json!({ "action": action, "screenshot": screenshot, "success": true })
            }),
            "close" => from_outcome(self.browser.close().await, |closed| {
                json!({ "action": action, "success": closed })
            }),
            other => ToolResult::failure(format!("Unknown action: {}", other)),
        };
        Ok(result)
    }
}
