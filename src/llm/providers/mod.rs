// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM provider implementations

mod common;

pub mod anthropic;
pub mod openai;

pub use anthropic::{anthropic_model_info, AnthropicProvider, ANTHROPIC_MODELS};
pub use openai::{openai_model_info, OpenAiProvider, OPENAI_MODELS};
