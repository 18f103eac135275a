// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Assistant modes
//!
//! A mode is a persona: a role definition prepended to the system prompt and a
//! set of tool groups the model may use while the mode is active.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::error::{AgentError, Result};

/// Category of tool a mode can allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    Read,
    Edit,
    Browser,
    Command,
    Mcp,
}

/// A named assistant persona
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mode {
    #[serde(default = "new_mode_id")]
    pub id: String,
    pub slug: String,
    pub name: String,
    pub role_definition: String,
    pub groups: Vec<ToolGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

fn new_mode_id() -> String {
    Uuid::new_v4().to_string()
}

const BUILTIN_SLUGS: [&str; 4] = ["code", "architect", "ask", "debug"];

const ALL_GROUPS: [ToolGroup; 5] = [
    ToolGroup::Read,
    ToolGroup::Edit,
    ToolGroup::Browser,
    ToolGroup::Command,
    ToolGroup::Mcp,
];

impl Mode {
    /// Create a mode with a fresh id
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        role_definition: impl Into<String>,
        groups: Vec<ToolGroup>,
    ) -> Self {
        Self {
            id: new_mode_id(),
            slug: slug.into(),
            name: name.into(),
            role_definition: role_definition.into(),
            groups,
            custom_instructions: None,
        }
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    fn builtin(slug: &str, name: &str, role_definition: &str, groups: &[ToolGroup]) -> Self {
        Self {
            id: slug.to_string(),
            slug: slug.to_string(),
            name: name.to_string(),
            role_definition: role_definition.to_string(),
            groups: groups.to_vec(),
            custom_instructions: None,
        }
    }

    pub fn code() -> Self {
        Self::builtin(
            "code",
            "Code",
            "You are a highly skilled software engineer with extensive knowledge in many programming languages, frameworks, design patterns, and best practices.",
            &ALL_GROUPS,
        )
    }

    pub fn architect() -> Self {
        Self::builtin(
            "architect",
            "Architect",
            "You are an experienced technical leader who is inquisitive and an excellent planner.",
            &ALL_GROUPS,
        )
    }

    pub fn ask() -> Self {
        Self::builtin(
            "ask",
            "Ask",
            "You are a knowledgeable technical assistant focused on answering questions about software development and technology.",
            &[ToolGroup::Read, ToolGroup::Browser, ToolGroup::Mcp],
        )
    }

    pub fn debug() -> Self {
        Self::builtin(
            "debug",
            "Debug",
            "You are an expert software debugger specializing in systematic problem diagnosis and resolution.",
            &ALL_GROUPS,
        )
    }

    /// Whether tools of `group` may run in this mode
    pub fn allows(&self, group: ToolGroup) -> bool {
        self.groups.contains(&group)
    }

    /// Whether this is one of the shipped modes
    pub fn is_builtin(&self) -> bool {
        BUILTIN_SLUGS.contains(&self.id.as_str())
    }

    /// System prompt for this mode
    pub fn system_prompt(&self) -> String {
        match &self.custom_instructions {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{}\n\n{}", self.role_definition, extra)
            }
            _ => self.role_definition.clone(),
        }
    }
}

impl PartialEq for Mode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Mode {}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomModesFile {
    #[serde(default)]
    custom_modes: Vec<Mode>,
}

/// Registry of available modes keyed by slug
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: BTreeMap<String, Mode>,
    current: String,
}

impl ModeRegistry {
    /// Registry with the built-in modes, `code` active
    pub fn new() -> Self {
        let mut modes = BTreeMap::new();
        for mode in [Mode::code(), Mode::architect(), Mode::ask(), Mode::debug()] {
            modes.insert(mode.slug.clone(), mode);
        }
        Self {
            modes,
            current: "code".to_string(),
        }
    }

    pub fn get(&self, slug: &str) -> Option<&Mode> {
        self.modes.get(slug)
    }

    pub fn all(&self) -> Vec<&Mode> {
        self.modes.values().collect()
    }

    /// The active mode
    pub fn current(&self) -> &Mode {
        // `remove` re-seeds `code`, so the lookup only misses on a corrupted registry.
        self.modes
            .get(&self.current)
            .unwrap_or_else(|| fallback_mode())
    }

    /// Switch the active mode
    pub fn set_current(&mut self, slug: &str) -> Result<&Mode> {
        if !self.modes.contains_key(slug) {
            return Err(AgentError::NotFound(format!("Mode not found: {}", slug)));
        }
        self.current = slug.to_string();
        Ok(self.current())
    }

    /// Add or replace a mode by slug
    pub fn add(&mut self, mode: Mode) {
        self.modes.insert(mode.slug.clone(), mode);
    }

    /// Remove a mode. The active mode falls back to `code` when removed.
    pub fn remove(&mut self, slug: &str) -> Result<Mode> {
        let removed = self
            .modes
            .remove(slug)
            .ok_or_else(|| AgentError::NotFound(format!("Mode not found: {}", slug)))?;
        if self.current == slug {
            self.modes
                .entry("code".to_string())
                .or_insert_with(Mode::code);
            self.current = "code".to_string();
        }
        Ok(removed)
    }

    /// Load custom modes from a `{"customModes": [...]}` file. A missing file is not an error.
    pub fn load_custom_modes(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = std::fs::read_to_string(path)?;
        let file: CustomModesFile = serde_json::from_str(&content)?;
        let count = file.custom_modes.len();
        for mode in file.custom_modes {
            tracing::debug!(slug = %mode.slug, "loaded custom mode");
            self.add(mode);
        }
        Ok(count)
    }

    /// Save every non-built-in mode to `path`
    pub fn save_custom_modes(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CustomModesFile {
            custom_modes: self
                .modes
                .values()
                .filter(|m| !m.is_builtin())
                .cloned()
                .collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn fallback_mode() -> &'static Mode {
    static FALLBACK: std::sync::OnceLock<Mode> = std::sync::OnceLock::new();
    FALLBACK.get_or_init(Mode::code)
}
