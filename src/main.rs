// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! agent-core command-line entry point

use anyhow::{Context, Result};
use clap::Parser;

use agent_core::cli::{Cli, Commands};
use agent_core::config::Settings;

#[path = "main/commands.rs"]
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on this crate's diagnostics; `RUST_LOG` can still add more.
    let crate_level = match cli.verbose {
        0 => None,
        1 => Some("agent_core=debug"),
        _ => Some("agent_core=trace"),
    };
    if let Some(directive) = crate_level {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::load().context("failed to load settings")?,
    };

    let directory = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine working directory")?,
    };

    let format = cli.format;
    match cli.command {
        Commands::Tools(args) => commands::list_tools(&args, &directory, format),
        Commands::RunTool(args) => commands::run_tool(&args, &directory, format).await,
        Commands::Ask(args) => commands::ask(args, &settings, &directory, cli.verbose).await,
        Commands::Models(args) => commands::list_models(&args, &settings, format),
        Commands::Modes => commands::list_modes(format),
    }
}
