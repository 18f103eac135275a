// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Subcommand implementations

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tokio::sync::mpsc;

use agent_core::cli::{AskArgs, ModelsArgs, OutputFormat, RunToolArgs, ToolsArgs};
use agent_core::config::Settings;
use agent_core::llm::factory::ProviderFactory;
use agent_core::modes::{Mode, ModeRegistry};
use agent_core::session::AgentSession;
use agent_core::tools::{
    ApproveAll, TerminalApprover, ToolApprover, ToolExecutor, ToolRegistry, ToolResult,
    ToolServices,
};

fn registry(directory: &Path) -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::with_builtins(ToolServices::local(directory)))
}

/// Built-in modes plus the user's custom modes
fn modes() -> ModeRegistry {
    let mut modes = ModeRegistry::new();
    if let Err(e) = modes.load_custom_modes(&Settings::custom_modes_path()) {
        tracing::warn!(error = %e, "ignoring unreadable custom modes file");
    }
    modes
}

fn find_mode(slug: &str) -> Result<Mode> {
    modes()
        .get(slug)
        .cloned()
        .ok_or_else(|| anyhow!("Mode not found: {}", slug))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn list_tools(args: &ToolsArgs, directory: &Path, format: OutputFormat) -> Result<()> {
    let registry = registry(directory);
    let descriptors = match &args.mode {
        Some(slug) => registry.descriptors_for_mode(&find_mode(slug)?),
        None => registry.descriptors(),
    };

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&descriptors)?),
        OutputFormat::Text => {
            for descriptor in descriptors {
                let summary = descriptor.description.lines().next().unwrap_or_default();
                println!("{:<28} {}", descriptor.name, summary);
            }
            Ok(())
        }
    }
}

pub async fn run_tool(args: &RunToolArgs, directory: &Path, format: OutputFormat) -> Result<()> {
    let executor = ToolExecutor::new(registry(directory));
    let result = executor.execute_tool_from_string(&args.name, &args.args).await;

    match format {
        OutputFormat::Json => print_json(&result.to_json())?,
        OutputFormat::Text => match &result {
            ToolResult::Success(content) => match content.get("text").and_then(|t| t.as_str()) {
                Some(text) => println!("{}", text),
                None => println!("{}", serde_json::to_string_pretty(content)?),
            },
            ToolResult::Failure(message) => eprintln!("{}", message),
        },
    }

    if result.is_success() {
        Ok(())
    } else {
        bail!("tool '{}' failed", args.name)
    }
}

fn read_prompt(args: &AskArgs) -> Result<String> {
    let prompt = match (&args.prompt, args.stdin) {
        (Some(prompt), false) => prompt.clone(),
        (prompt, _) => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read prompt from stdin")?;
            match prompt {
                Some(prefix) => format!("{}\n\n{}", prefix, input),
                None => input,
            }
        }
    };
    if prompt.trim().is_empty() {
        bail!("empty prompt");
    }
    Ok(prompt)
}

pub async fn ask(args: AskArgs, settings: &Settings, directory: &Path, verbose: u8) -> Result<()> {
    let prompt = read_prompt(&args)?;
    let provider_name = ProviderFactory::resolve_provider_name(args.provider.as_deref(), settings);
    let provider = ProviderFactory::create(&provider_name, settings)?;
    let mode = find_mode(args.mode.as_deref().unwrap_or(&settings.session.default_mode))?;
    let approver: Arc<dyn ToolApprover> = if args.trust {
        Arc::new(ApproveAll)
    } else {
        Arc::new(TerminalApprover)
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(chunk) = rx.recv().await {
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        }
    });

    let session = Arc::new(
        AgentSession::builder(provider, ToolExecutor::new(registry(directory)))
            .settings(settings)
            .mode(mode)
            .approver(approver)
            .text_sink(tx)
            .build(),
    );

    let canceller = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                session.cancel();
            }
        })
    };

    let outcome = session.send(&prompt).await;
    canceller.abort();
    let _ = canceller.await;

    let metrics = session.metrics();
    drop(session);
    let _ = printer.await;
    println!();

    let outcome = outcome?;
    if outcome.hit_round_limit {
        eprintln!(
            "Stopped after {} tool rounds; ask again to continue.",
            outcome.tool_rounds
        );
    }
    if verbose > 0 {
        let snapshot = metrics.snapshot();
        eprintln!(
            "{}",
            json!({
                "requests": snapshot.total_requests,
                "input_tokens": snapshot.total_input_tokens,
                "output_tokens": snapshot.total_output_tokens,
                "average_latency_ms": snapshot.average_latency_ms(),
                "tool_rounds": outcome.tool_rounds,
            })
        );
    }
    Ok(())
}

pub fn list_models(args: &ModelsArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let provider = ProviderFactory::resolve_provider_name(args.provider.as_deref(), settings);
    let models = ProviderFactory::known_models(&provider, settings)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&models)?),
        OutputFormat::Text => {
            for model in models {
                let caching = if model.supports_prompt_caching {
                    "prompt caching"
                } else {
                    ""
                };
                println!("{:<30} {:<20} {}", model.id, model.name, caching);
            }
            Ok(())
        }
    }
}

pub fn list_modes(format: OutputFormat) -> Result<()> {
    let modes = modes();

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(modes.all())?),
        OutputFormat::Text => {
            for mode in modes.all() {
                let groups: Vec<String> = mode
                    .groups
                    .iter()
                    .filter_map(|g| serde_json::to_value(g).ok())
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                let marker = if mode.is_builtin() { "" } else { " (custom)" };
                println!(
                    "{:<12} {}{} [{}]",
                    mode.slug,
                    mode.name,
                    marker,
                    groups.join(", ")
                );
            }
            Ok(())
        }
    }
}
