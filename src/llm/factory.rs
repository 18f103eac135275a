// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating LLM providers from settings

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{AgentError, Result};
use crate::llm::provider::{ApiProvider, ModelInfo};
use crate::llm::providers::{
    anthropic_model_info, openai_model_info, AnthropicProvider, OpenAiProvider, ANTHROPIC_MODELS,
    OPENAI_MODELS,
};

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create an LLM provider by name
    ///
    /// # Arguments
    /// * `provider_name` - One of: "anthropic", "openai"
    /// * `settings` - Application settings containing provider configuration
    pub fn create(provider_name: &str, settings: &Settings) -> Result<Arc<dyn ApiProvider>> {
        match provider_name {
            "anthropic" => Self::create_anthropic(settings),
            "openai" => Self::create_openai(settings),
            other => Err(AgentError::Config(format!("Unknown provider: {}", other))),
        }
    }

    /// Create the provider named by `providers.default`
    pub fn create_default(settings: &Settings) -> Result<Arc<dyn ApiProvider>> {
        Self::create(&settings.providers.default, settings)
    }

    /// Create an Anthropic provider
    pub fn create_anthropic(settings: &Settings) -> Result<Arc<dyn ApiProvider>> {
        let api_key = settings.get_anthropic_api_key().ok_or_else(|| {
            AgentError::Config(format!(
                "No Anthropic API key found. Set {} env var or providers.anthropic.api_key in settings.json.",
                settings.providers.anthropic.api_key_env
            ))
        })?;

        let provider =
            AnthropicProvider::from_config(&settings.providers.anthropic, api_key, &settings.http)?;
        tracing::debug!(model = %settings.providers.anthropic.model, "created Anthropic provider");
        Ok(Arc::new(provider))
    }

    /// Create an OpenAI provider, targeting Azure when `providers.openai.azure` is set
    pub fn create_openai(settings: &Settings) -> Result<Arc<dyn ApiProvider>> {
        let api_key = settings.get_openai_api_key().ok_or_else(|| {
            AgentError::Config(format!(
                "No OpenAI API key found. Set {} env var or providers.openai.api_key in settings.json.",
                settings.providers.openai.api_key_env
            ))
        })?;

        let provider =
            OpenAiProvider::from_config(&settings.providers.openai, api_key, &settings.http)?;
        tracing::debug!(
            model = %settings.providers.openai.model,
            azure = provider.is_azure(),
            "created OpenAI provider"
        );
        Ok(Arc::new(provider))
    }

    /// Get the configured model for a provider
    pub fn default_model(provider_name: &str, settings: &Settings) -> Option<String> {
        match provider_name {
            "anthropic" => Some(settings.providers.anthropic.model.clone()),
            "openai" => Some(settings.providers.openai.model.clone()),
            _ => None,
        }
    }

    /// Get the provider name from settings, with fallback to default
    pub fn resolve_provider_name(requested: Option<&str>, settings: &Settings) -> String {
        requested
            .map(|s| s.to_string())
            .unwrap_or_else(|| settings.providers.default.clone())
    }

    /// Known models of a provider, with the configured max tokens
    pub fn known_models(provider_name: &str, settings: &Settings) -> Result<Vec<ModelInfo>> {
        match provider_name {
            "anthropic" => Ok(ANTHROPIC_MODELS
                .iter()
                .map(|id| anthropic_model_info(id, settings.providers.anthropic.max_tokens))
                .collect()),
            "openai" => Ok(OPENAI_MODELS
                .iter()
                .map(|id| openai_model_info(id, settings.providers.openai.max_tokens))
                .collect()),
            other => Err(AgentError::Config(format!("Unknown provider: {}", other))),
        }
    }

    /// List all supported provider names
    pub fn supported_providers() -> &'static [&'static str] {
        &["anthropic", "openai"]
    }
}
