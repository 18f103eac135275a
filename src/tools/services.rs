// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Capabilities the built-in tools act through
//!
//! Tools never touch the filesystem, a shell or a browser directly. They go
//! through these traits, so a host can swap in its own implementations
//! (an editor's virtual filesystem, a remote runner) and tests can mock them.

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::error::{AgentError, Result};

/// Matches per file, keyed by path relative to the searched directory
pub type FileMatches = BTreeMap<String, Vec<String>>;

/// File access used by the read, edit and search tools
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileService: Send + Sync {
    /// Read a whole file as UTF-8
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Create or overwrite a file, creating parent directories
    async fn write_file(&self, path: &str, content: &str) -> Result<bool>;

    /// Replace lines `start_line..=end_line` (1-based) with `replacement`
    async fn apply_diff(
        &self,
        path: &str,
        replacement: &str,
        start_line: u64,
        end_line: u64,
    ) -> Result<bool>;

    /// Regex search below `path`, restricted to file names matching `file_pattern`
    async fn search_files(&self, path: &str, regex: &str, file_pattern: &str)
        -> Result<FileMatches>;

    /// List entries below `path`. Directories carry a trailing `/`.
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>>;

    /// Top-level definitions (functions, types, classes) per source file
    async fn list_code_definitions(&self, path: &str) -> Result<FileMatches>;
}

/// Shell command execution
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its combined output
    async fn run(&self, command: &str, timeout: Duration) -> Result<String>;
}

/// A headless browser the `browser_action` tool drives.
///
/// Every action except `close` returns a screenshot, encoded however the
/// implementation chooses (typically a base64 PNG data URL).
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn launch(&self, url: &str) -> Result<String>;
    async fn click(&self, coordinate: &str) -> Result<String>;
    async fn type_text(&self, text: &str) -> Result<String>;
    async fn scroll_down(&self) -> Result<String>;
    async fn scroll_up(&self) -> Result<String>;
    async fn close(&self) -> Result<bool>;
    fn is_running(&self) -> bool;
}

/// Asks the human a question and waits for the answer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserPrompt: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

/// Everything the built-in tools need
#[derive(Clone)]
pub struct ToolServices {
    pub files: Arc<dyn FileService>,
    pub commands: Arc<dyn CommandRunner>,
    pub browser: Option<Arc<dyn BrowserSession>>,
    pub prompt: Arc<dyn UserPrompt>,
}

impl ToolServices {
    /// Local filesystem and shell rooted at `root`, answers read from stdin, no browser
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            files: Arc::new(LocalFileService::new(root.clone())),
            commands: Arc::new(ShellRunner::new(root)),
            browser: None,
            prompt: Arc::new(StdinPrompt),
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserSession>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn UserPrompt>) -> Self {
        self.prompt = prompt;
        self
    }
}

impl std::fmt::Debug for ToolServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServices")
            .field("has_browser", &self.browser.is_some())
            .finish_non_exhaustive()
    }
}

/// `FileService` over the local disk. Relative paths resolve against `root`.
#[derive(Debug, Clone)]
pub struct LocalFileService {
    root: PathBuf,
}

impl LocalFileService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.root.join(candidate)
        }
    }
}

fn not_found(path: &str) -> AgentError {
    AgentError::NotFound(format!("File not found: {}", path))
}

fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[async_trait]
impl FileService for LocalFileService {
    async fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(not_found(path));
        }
        Ok(tokio::fs::read_to_string(&full).await?)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<bool> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        tracing::debug!(path = %full.display(), bytes = content.len(), "wrote file");
        Ok(true)
    }

    async fn apply_diff(
        &self,
        path: &str,
        replacement: &str,
        start_line: u64,
        end_line: u64,
    ) -> Result<bool> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(not_found(path));
        }
        let original = tokio::fs::read_to_string(&full).await?;
        let updated = replace_line_range(&original, replacement, start_line, end_line)?;
        tokio::fs::write(&full, updated).await?;
        Ok(true)
    }

    async fn search_files(
        &self,
        path: &str,
        regex: &str,
        file_pattern: &str,
    ) -> Result<FileMatches> {
        let regex = Regex::new(regex)
            .map_err(|e| AgentError::InvalidInput(format!("Invalid regex pattern: {}", e)))?;
        let pattern = glob::Pattern::new(file_pattern)
            .map_err(|e| AgentError::InvalidInput(format!("Invalid file pattern: {}", e)))?;
        let base = self.resolve(path);
        if !base.exists() {
            return Err(not_found(path));
        }

        tokio::task::spawn_blocking(move || search_tree(&base, &regex, &pattern))
            .await
            .map_err(|e| AgentError::ToolExecution(format!("search task failed: {}", e)))
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<String>> {
        let base = self.resolve(path);
        if !base.is_dir() {
            return Err(AgentError::NotFound(format!("Directory not found: {}", path)));
        }

        tokio::task::spawn_blocking(move || {
            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut files: Vec<String> = WalkDir::new(&base)
                .min_depth(1)
                .max_depth(max_depth)
                .into_iter()
                .filter_entry(|e| !is_hidden_or_ignored(e.path(), &base))
                .filter_map(|e| e.ok())
                .map(|entry| {
                    let mut name = relative_display(entry.path(), &base);
                    if entry.file_type().is_dir() {
                        name.push('/');
                    }
                    name
                })
                .collect();
            files.sort();
            files
        })
        .await
        .map_err(|e| AgentError::ToolExecution(format!("listing task failed: {}", e)))
    }

    async fn list_code_definitions(&self, path: &str) -> Result<FileMatches> {
        let base = self.resolve(path);
        if !base.exists() {
            return Err(not_found(path));
        }

        tokio::task::spawn_blocking(move || {
            let mut result = FileMatches::new();
            let walk_root = if base.is_file() {
                base.parent().map(Path::to_path_buf).unwrap_or_default()
            } else {
                base.clone()
            };
            for entry in WalkDir::new(&base)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                if is_likely_binary(path) || is_hidden_or_ignored(path, &walk_root) {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(path) else {
                    continue;
                };
                let definitions = extract_definitions(&content);
                if !definitions.is_empty() {
                    result.insert(relative_display(path, &walk_root), definitions);
                }
            }
            result
        })
        .await
        .map_err(|e| AgentError::ToolExecution(format!("definition scan failed: {}", e)))
    }
}

/// Replace the 1-based inclusive line range with `replacement`, keeping a trailing newline.
fn replace_line_range(
    original: &str,
    replacement: &str,
    start_line: u64,
    end_line: u64,
) -> Result<String> {
    let lines: Vec<&str> = original.lines().collect();
    let total = lines.len() as u64;
    if start_line == 0 || end_line < start_line || start_line > total + 1 {
        return Err(AgentError::Validation(format!(
            "Invalid line range {}-{} for a file with {} lines",
            start_line, end_line, total
        )));
    }

    let start = (start_line - 1) as usize;
    let end = end_line.min(total) as usize;

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend_from_slice(&lines[..start]);
    out.extend(replacement.lines());
    out.extend_from_slice(&lines[end..]);

    let mut text = out.join("\n");
    if original.ends_with('\n') || original.is_empty() {
        text.push('\n');
    }
    Ok(text)
}

fn search_tree(base: &Path, regex: &Regex, pattern: &glob::Pattern) -> FileMatches {
    let mut results = FileMatches::new();
    let root = if base.is_file() {
        base.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        base.to_path_buf()
    };

    for entry in WalkDir::new(base)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden_or_ignored(e.path(), &root))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name_matches = path
            .file_name()
            .map(|n| pattern.matches(&n.to_string_lossy()))
            .unwrap_or(false);
        if !name_matches || is_likely_binary(path) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        let matches: Vec<String> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| regex.is_match(line))
            .map(|(i, line)| format!("{}: {}", i + 1, line.trim_end()))
            .collect();
        if !matches.is_empty() {
            results.insert(relative_display(path, &root), matches);
        }
    }
    results
}

fn definition_regex() -> Option<&'static Regex> {
    static DEFINITION: OnceLock<Option<Regex>> = OnceLock::new();
    DEFINITION
        .get_or_init(|| {
            Regex::new(
            r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|public|private|protected|internal|abstract|final|static|async|open|data|sealed|unsafe)\s+)*(fn|struct|enum|trait|impl|mod|type|class|interface|object|def|function|func|fun)\s+([A-Za-z_][A-Za-z0-9_]*)",
            )
            .ok()
        })
        .as_ref()
}

fn extract_definitions(content: &str) -> Vec<String> {
    let Some(regex) = definition_regex() else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| {
            regex
                .captures(line)
                .map(|caps| format!("{} {}", &caps[1], &caps[2]))
        })
        .collect()
}

fn is_likely_binary(path: &Path) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    matches!(
        ext.to_string_lossy().to_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "ico" | "woff" | "woff2" | "ttf" | "eot"
            | "zip" | "tar" | "gz" | "rar" | "7z" | "exe" | "dll" | "so" | "dylib"
            | "pdf" | "mp3" | "mp4" | "mov" | "wav" | "o" | "a" | "class" | "jar"
            | "pyc" | "db" | "sqlite"
    )
}

/// Hidden or vendored directories, judged only on components below `root`.
fn is_hidden_or_ignored(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.')
                || matches!(
                    name.as_ref(),
                    "node_modules" | "target" | "__pycache__" | "venv" | "dist" | "build" | "vendor"
                )
        }
        _ => false,
    })
}

/// Runs commands through `sh -c` in a working directory
#[derive(Debug, Clone)]
pub struct ShellRunner {
    working_directory: PathBuf,
}

impl ShellRunner {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, timeout: Duration) -> Result<String> {
        tracing::debug!(command, "running shell command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::ToolExecution(format!("Failed to spawn command: {}", e)))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(AgentError::ToolExecution(format!(
                    "Command timed out after {} seconds",
                    timeout.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(AgentError::ToolExecution(format!(
                "Command exited with code {}: {}",
                code, detail
            )));
        }

        let mut combined = stdout.into_owned();
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        Ok(combined)
    }
}

/// Asks on stderr and reads one line from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

#[async_trait]
impl UserPrompt for StdinPrompt {
    async fn ask(&self, question: &str) -> Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(format!("{}\n> ", question).as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
