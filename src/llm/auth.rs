// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! API credential handling

use reqwest::RequestBuilder;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{AgentError, Result};

/// How long an issued token is reused before it is derived again
pub const TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Holds an API key and turns it into request credentials
#[derive(Debug)]
pub struct ApiAuthentication {
    api_key: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ApiAuthentication {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn is_api_key_set(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The raw key, failing when none is configured
    pub fn api_key(&self) -> Result<&str> {
        if self.is_api_key_set() {
            Ok(&self.api_key)
        } else {
            Err(AgentError::Auth("API key is not set".to_string()))
        }
    }

    /// Add `Authorization: Bearer <key>` to a request.
    pub fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(self.api_key()?))
    }

    /// Bearer token for the API. The key itself is the token; it is cached for an hour.
    pub fn token(&self) -> Result<String> {
        let mut cached = self.lock();
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let value = self.api_key()?.to_string();
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + TOKEN_TTL,
        });
        Ok(value)
    }

    /// Drop the cached token and derive a fresh one.
    pub fn refresh_token(&self) -> Result<String> {
        self.lock().take();
        self.token()
    }

    pub fn has_cached_token(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CachedToken>> {
        match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Token cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
