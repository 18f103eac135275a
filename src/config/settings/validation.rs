// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{AgentError, Result};

use super::Settings;

impl Settings {
    /// Get the API key for Anthropic, checking env var first.
    pub fn get_anthropic_api_key(&self) -> Option<String> {
        non_empty_env(&self.providers.anthropic.api_key_env)
            .or_else(|| non_empty(self.providers.anthropic.api_key.clone()))
    }

    /// Get the API key for OpenAI, checking env var first.
    pub fn get_openai_api_key(&self) -> Option<String> {
        non_empty_env(&self.providers.openai.api_key_env)
            .or_else(|| non_empty(self.providers.openai.api_key.clone()))
    }

    /// Check if the given provider has a usable API key.
    pub fn is_provider_configured(&self, provider: &str) -> bool {
        match provider {
            "anthropic" => self.get_anthropic_api_key().is_some(),
            "openai" => self.get_openai_api_key().is_some(),
            _ => false,
        }
    }

    /// Reject values that would make the runtime misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limits.max_requests_per_minute == 0 {
            return Err(AgentError::Config(
                "rate_limits.max_requests_per_minute must be greater than 0".to_string(),
            ));
        }
        if self.resilience.backoff_factor < 1.0 {
            return Err(AgentError::Config(
                "resilience.backoff_factor must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resilience.jitter) {
            return Err(AgentError::Config(
                "resilience.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.session.max_tool_rounds == 0 {
            return Err(AgentError::Config(
                "session.max_tool_rounds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
