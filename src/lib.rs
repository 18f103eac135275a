// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! agent-core - the agent execution core of an AI coding assistant.
//!
//! This crate exposes the runtime shared by the `agent-core` CLI
//! (`src/main.rs`) and any embedding frontend.
//!
//! Architecture highlights:
//! - `llm`: conversations, the provider abstraction (Anthropic, OpenAI/Azure),
//!   streaming, rate limiting, retry, authentication and metrics
//! - `tools`: the tool trait, registry, executor, approval policy and the
//!   built-in tool set
//! - `session`: the model/tool loop tying the two together
//! - `modes`: assistant personas and the tool groups they allow
//! - `mcp`: registry of MCP servers
//! - `config`: JSON settings under `$AGENT_CORE_HOME`

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod modes;
pub mod session;
pub mod tools;

pub use error::{AgentError, Result};
