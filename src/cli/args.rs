// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// agent-core - drive the agent core from a terminal
#[derive(Parser, Debug)]
#[command(name = "agent-core")]
#[command(version, about = "Run tools and talk to models through the agent core")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Working directory tools operate in (defaults to current)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Settings file path (defaults to $AGENT_CORE_HOME/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the registered tools
    Tools(ToolsArgs),

    /// Run one tool with JSON arguments
    RunTool(RunToolArgs),

    /// Ask the model, letting it use tools
    Ask(AskArgs),

    /// List known models of a provider
    Models(ModelsArgs),

    /// List available modes
    Modes,
}

/// Arguments for the tools subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ToolsArgs {
    /// Only tools allowed in this mode
    #[arg(short, long)]
    pub mode: Option<String>,
}

/// Arguments for the run-tool subcommand
#[derive(clap::Args, Debug)]
pub struct RunToolArgs {
    /// Tool name, e.g. read_file
    pub name: String,

    /// Arguments as a JSON object
    #[arg(default_value = "{}")]
    pub args: String,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: Option<String>,

    /// LLM provider to use (anthropic, openai)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Mode to run in
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Auto-approve all tool calls
    #[arg(long)]
    pub trust: bool,

    /// Read prompt from stdin
    #[arg(long)]
    pub stdin: bool,
}

/// Arguments for the models subcommand
#[derive(clap::Args, Debug)]
pub struct ModelsArgs {
    /// Provider whose models to list (defaults to the configured one)
    #[arg(short, long)]
    pub provider: Option<String>,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
