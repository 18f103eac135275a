// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for agent-core
//!
//! Handles loading and saving settings from ~/.agent-core/settings.json

use serde::{Deserialize, Serialize};

use crate::tools::AutoApprovalSettings;

mod io;
mod migration;
mod validation;

/// Main settings structure, stored in ~/.agent-core/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// LLM provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Request rate limiting
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    /// Retry settings for API calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// HTTP client timeouts
    #[serde(default)]
    pub http: HttpConfig,

    /// Which tools run without asking
    #[serde(default)]
    pub auto_approval: AutoApprovalSettings,

    /// Defaults for new sessions
    #[serde(default)]
    pub session: SessionConfig,
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider used when none is named explicitly
    #[serde(default = "default_provider")]
    pub default: String,

    /// Anthropic Claude configuration
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// OpenAI (or Azure OpenAI) configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            anthropic: AnthropicConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Anthropic-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model to use
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Mark system and user content as cacheable on models that support it
    #[serde(default = "default_true")]
    pub enable_prompt_caching: bool,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_anthropic_api_key_env(),
            base_url: None,
            model: default_anthropic_model(),
            max_tokens: default_max_tokens(),
            enable_prompt_caching: true,
        }
    }
}

/// OpenAI-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API. For Azure this is the resource endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model to use (the deployment name on Azure)
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Talk to an Azure OpenAI deployment
    #[serde(default)]
    pub azure: bool,

    /// `api-version` query parameter for Azure
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openai_api_key_env(),
            base_url: None,
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
            azure: false,
            azure_api_version: default_azure_api_version(),
        }
    }
}

/// Request rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Requests allowed per rolling minute
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,

    /// How long a request waits for a permit before failing
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Retry and resilience configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter fraction (0.0 to 1.0) for randomizing delays
    #[serde(default)]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

/// HTTP client timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Kept for settings compatibility; the HTTP client has no separate write timeout
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

/// Defaults for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Mode slug active at start
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Upper bound on model/tool round trips per user turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-opus-20240229".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_azure_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_true() -> bool {
    true
}

fn default_max_requests_per_minute() -> u32 {
    60
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_write_timeout_secs() -> u64 {
    30
}

fn default_mode() -> String {
    "code".to_string()
}

fn default_max_tool_rounds() -> u32 {
    25
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.providers.default, "anthropic");
        assert_eq!(settings.rate_limits.max_requests_per_minute, 60);
        assert_eq!(settings.rate_limits.acquire_timeout_secs, 30);
        assert_eq!(settings.session.default_mode, "code");
        assert!(!settings.auto_approval.enabled);
    }

    #[test]
    fn test_resilience_defaults() {
        let resilience = ResilienceConfig::default();
        assert_eq!(resilience.max_retries, 3);
        assert_eq!(resilience.initial_delay_ms, 1000);
        assert_eq!(resilience.backoff_factor, 2.0);
        assert_eq!(resilience.max_delay_ms, 10_000);
        assert_eq!(resilience.jitter, 0.0);
    }

    #[test]
    fn test_http_defaults() {
        let http = HttpConfig::default();
        assert_eq!(
            (http.connect_timeout_secs, http.read_timeout_secs, http.write_timeout_secs),
            (30, 60, 30)
        );
    }

    #[test]
    fn test_provider_defaults() {
        let providers = ProvidersConfig::default();
        assert_eq!(providers.anthropic.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(providers.anthropic.max_tokens, 4000);
        assert!(providers.anthropic.enable_prompt_caching);
        assert_eq!(providers.openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(providers.openai.model, "gpt-4");
        assert!(!providers.openai.azure);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"providers": {"openai": {"azure": true}}, "session": {"max_tool_rounds": 5}}"#,
        )
        .unwrap();
        assert!(settings.providers.openai.azure);
        assert_eq!(settings.providers.openai.azure_api_version, "2023-05-15");
        assert_eq!(settings.providers.default, "anthropic");
        assert_eq!(settings.session.max_tool_rounds, 5);
        assert_eq!(settings.session.default_mode, "code");
    }

    #[test]
    fn test_settings_load_from_nonexistent() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp.path().join("missing.json")).unwrap();
        assert_eq!(settings.providers.default, "anthropic");
    }

    #[test]
    fn test_settings_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/settings.json");

        let mut settings = Settings::default();
        settings.providers.default = "openai".to_string();
        settings.rate_limits.max_requests_per_minute = 10;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.providers.default, "openai");
        assert_eq!(loaded.rate_limits.max_requests_per_minute, 10);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"editor": {"theme": "dark"}, "providers": {"anthropic": {"team": "infra"}}}"#,
        )
        .unwrap();

        Settings::load_from(&path).unwrap().save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["editor"]["theme"], "dark");
        assert_eq!(raw["providers"]["anthropic"]["team"], "infra");
        assert_eq!(raw["providers"]["anthropic"]["api_key_env"], "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_settings_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
