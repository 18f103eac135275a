// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM layer
//!
//! Conversations, the provider abstraction with its Anthropic and OpenAI
//! implementations, and the request plumbing around them: rate limiting,
//! retry, authentication and metrics.

pub mod auth;
pub mod conversation;
pub mod factory;
pub mod message;
pub mod metrics;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod rate_limiter;
pub mod retry;
pub mod stream;

pub use conversation::{Conversation, SharedConversation};
pub use message::{Message, Role};
pub use provider::*;
