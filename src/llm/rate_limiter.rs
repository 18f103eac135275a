// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request rate limiting for provider calls
//!
//! A semaphore holds one permit per request allowed in a rolling minute.
//! Starting a request consumes a permit for good; a background ticker puts
//! one back every `60s / N` until the pool is full again. Callers wait for a
//! permit up to the acquire timeout and then fail with `RateLimitExceeded`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::settings::RateLimitsConfig;
use crate::error::{AgentError, Result};

const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ticker-fed permit pool
#[derive(Debug)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    max_requests_per_minute: u32,
    acquire_timeout: Duration,
    ticker: JoinHandle<()>,
}

impl RateLimiter {
    /// Create a limiter and start its ticker. Must be called inside a tokio runtime.
    pub fn new(max_requests_per_minute: u32, acquire_timeout: Duration) -> Self {
        let max = max_requests_per_minute.max(1);
        let permits = Arc::new(Semaphore::new(max as usize));
        let ticker = tokio::spawn(replenish(permits.clone(), max));

        tracing::debug!(max_requests_per_minute = max, "rate limiter started");

        Self {
            permits,
            max_requests_per_minute: max,
            acquire_timeout,
            ticker,
        }
    }

    /// 60 requests per minute with a 30 second acquire timeout
    pub fn default_limiter() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn from_config(config: &RateLimitsConfig) -> Self {
        Self::new(
            config.max_requests_per_minute,
            Duration::from_secs(config.acquire_timeout_secs),
        )
    }

    pub fn max_requests_per_minute(&self) -> u32 {
        self.max_requests_per_minute
    }

    /// Permits that can be taken right now without waiting
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `operation` once a permit is available.
    ///
    /// The operation is not started when no permit arrives within the
    /// acquire timeout. Its own result is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_cancel(&CancellationToken::new(), operation)
            .await
    }

    /// Like [`execute`](Self::execute), but stops waiting for a permit
    /// once `cancel` fires. A cancelled wait consumes no permit.
    pub async fn execute_with_cancel<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AgentError::Cancelled("permit wait cancelled".to_string()));
            }
            acquired = self.try_acquire_timeout(self.acquire_timeout) => acquired,
        };
        if !acquired {
            return Err(AgentError::RateLimitExceeded(format!(
                "no request permit available within {} seconds",
                self.acquire_timeout.as_secs()
            )));
        }
        operation().await
    }

    /// Take one permit, waiting at most `timeout`. Returns whether a permit was taken.
    pub async fn try_acquire_timeout(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            Ok(Err(_closed)) => {
                tracing::debug!("rate limiter is shut down");
                false
            }
            Err(_elapsed) => {
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for a request permit"
                );
                false
            }
        }
    }

    /// Stop replenishing and fail every pending and future acquire.
    pub fn shutdown(&self) {
        self.ticker.abort();
        self.permits.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

async fn replenish(permits: Arc<Semaphore>, max: u32) {
    let period = Duration::from_millis(60_000 / u64::from(max)).max(Duration::from_millis(1));
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        if permits.is_closed() {
            return;
        }
        // Only this task adds permits, so the check cannot overshoot the pool.
        if permits.available_permits() < max as usize {
            permits.add_permits(1);
            tracing::trace!(available = permits.available_permits(), "request permit replenished");
        }
    }
}
