// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for agent-core
//!
//! Provides the framework for tools that the model can use to interact with
//! the filesystem, run commands, drive a browser and talk to the user.
//!
//! Tools are looked up by name in a [`ToolRegistry`] and always run through a
//! [`ToolExecutor`], which turns every failure into a [`ToolResult::Failure`].

pub mod approval;
pub mod builtin;
pub mod definition;
pub mod executor;
pub mod result;
pub mod services;

pub use approval::*;
pub use definition::*;
pub use executor::*;
pub use result::ToolResult;
pub use services::ToolServices;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::modes::{Mode, ToolGroup};

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    /// What the tool does, shown to the model
    fn description(&self) -> &str;

    /// Parameters the tool accepts
    fn input_schema(&self) -> ToolInputSchema;

    /// Tool group used for mode filtering
    fn group(&self) -> ToolGroup;

    /// Why `args` are invalid, or `None` when they are acceptable
    fn validation_error(&self, args: &Value) -> Option<String> {
        self.input_schema().validate(args)
    }

    /// Whether `args` are acceptable
    fn validate_args(&self, args: &Value) -> bool {
        self.validation_error(args).is_none()
    }

    /// Run the tool. Capability failures should come back as `ToolResult::Failure`.
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    /// Descriptor sent to the model
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in tool wired to `services`.
    ///
    /// `browser_action` is only registered when a browser session is available.
    pub fn with_builtins(services: ToolServices) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(builtin::ReadFileTool::new(services.files.clone())));
        registry.register(Arc::new(builtin::WriteToFileTool::new(services.files.clone())));
        registry.register(Arc::new(builtin::ApplyDiffTool::new(services.files.clone())));
        registry.register(Arc::new(builtin::SearchFilesTool::new(services.files.clone())));
        registry.register(Arc::new(builtin::ListFilesTool::new(services.files.clone())));
        registry.register(Arc::new(builtin::ListCodeDefinitionsTool::new(
            services.files.clone(),
        )));
        registry.register(Arc::new(builtin::ExecuteCommandTool::new(
            services.commands.clone(),
        )));
        registry.register(Arc::new(builtin::AskFollowupQuestionTool::new(
            services.prompt.clone(),
        )));
        registry.register(Arc::new(builtin::AttemptCompletionTool::new(
            services.commands.clone(),
        )));

        if let Some(browser) = services.browser {
            registry.register(Arc::new(builtin::BrowserActionTool::new(browser)));
        }

        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool registered twice; replacing previous registration");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tools, ordered by name
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors of every tool
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Descriptors of the tools `mode` allows
    pub fn descriptors_for_mode(&self, mode: &Mode) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .filter(|t| mode.allows(t.group()))
            .map(|t| t.descriptor())
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool {
        label: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            self.label
        }

        fn input_schema(&self) -> ToolInputSchema {
            SchemaBuilder::new().string("text", "Text to echo", true).build()
        }

        fn group(&self) -> ToolGroup {
            ToolGroup::Command
        }

        async fn execute(&self, args: Value) -> Result<ToolResult> {
            Ok(ToolResult::success(args))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.count(), 0);
        assert!(registry.get("echo").is_none());
    }

    #[test]
    fn test_register_overwrites_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { label: "first" }));
        registry.register(Arc::new(EchoTool { label: "second" }));

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "second");
    }

    #[test]
    fn test_default_validation_uses_schema() {
        let tool = EchoTool { label: "echo" };
        assert!(tool.validate_args(&json!({"text": "hi"})));
        assert!(!tool.validate_args(&json!({})));
        assert_eq!(
            tool.validation_error(&json!({"text": 3})),
            Some("Parameter 'text' must be a string".to_string())
        );
    }

    #[test]
    fn test_with_builtins_registers_tool_set() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = ToolRegistry::with_builtins(ToolServices::local(temp.path()));

        let names = registry.names();
        for expected in [
            "read_file",
            "write_to_file",
            "apply_diff",
            "search_files",
            "list_files",
            "list_code_definition_names",
            "execute_command",
            "ask_followup_question",
            "attempt_completion",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(!names.contains(&"browser_action"));
        assert_eq!(registry.descriptors().len(), registry.count());
    }

    #[test]
    fn test_descriptors_for_mode_filters_groups() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = ToolRegistry::with_builtins(ToolServices::local(temp.path()));

        let ask: Vec<String> = registry
            .descriptors_for_mode(&Mode::ask())
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert!(ask.contains(&"read_file".to_string()));
        assert!(!ask.contains(&"write_to_file".to_string()));
        assert!(!ask.contains(&"execute_command".to_string()));

        assert_eq!(
            registry.descriptors_for_mode(&Mode::code()).len(),
            registry.count()
        );
    }
}
