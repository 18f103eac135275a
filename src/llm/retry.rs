// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry logic for API calls with exponential backoff

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::settings::ResilienceConfig;
use crate::error::{AgentError, Result};

/// Substrings of an error's display text that mark it as transient
const TRANSIENT_MARKERS: [&str; 5] = [
    "timeout",
    "timed out",
    "connection",
    "network",
    "server error",
];

/// Bounded exponential backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied after each retry
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Jitter fraction (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryStrategy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

impl RetryStrategy {
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        backoff_factor: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_factor,
            max_delay,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponential_ms = base_ms * self.backoff_factor.powi(retry as i32);
        let capped_ms = exponential_ms.min(self.max_delay.as_millis() as f64);

        let jitter_range = (capped_ms * self.jitter) as i64;
        let jitter_ms = if jitter_range > 0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        Duration::from_millis((capped_ms as i64 + jitter_ms).max(0) as u64)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries + 1` attempts have been made.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation)
            .await
    }

    /// Like [`execute`](Self::execute), but a cancelled token cuts the
    /// backoff short and no further attempt is started.
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        tracing::debug!(attempts = retry + 1, "API request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !is_retryable(&error) || retry >= self.max_retries {
                        return Err(error);
                    }

                    retry += 1;
                    let delay = self.delay_for(retry - 1);
                    tracing::warn!(
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying API request (attempt {} of {})",
                        retry,
                        self.max_retries
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!(attempts = retry, "Retry backoff cancelled");
                            return Err(AgentError::Cancelled("retry cancelled".to_string()));
                        }
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Determine if an error is worth another attempt
pub fn is_retryable(error: &AgentError) -> bool {
    match error {
        AgentError::Validation(_)
        | AgentError::NotFound(_)
        | AgentError::Auth(_)
        | AgentError::RateLimitExceeded(_)
        | AgentError::Cancelled(_) => false,
        other => {
            let text = other.to_string().to_lowercase();
            TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker))
                || has_server_status_token(&text)
        }
    }
}

fn has_server_status_token(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| {
        token.len() == 3 && token.starts_with('5') && token.bytes().all(|b| b.is_ascii_digit())
    })
}
