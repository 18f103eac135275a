// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-provider request metrics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of recent requests kept for inspection
pub const RECENT_REQUEST_CAPACITY: usize = 100;

/// One finished request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub success: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl RequestMetrics {
    pub fn latency_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_latency_ms: i64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub recent_requests: Vec<RequestMetrics>,
}

impl MetricsSnapshot {
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_latency_ms as f64 / self.total_requests as f64
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_latency_ms: i64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    recent: VecDeque<RequestMetrics>,
}

/// Request counters for one provider.
///
/// Every field lives behind a single lock, so a snapshot never mixes counters
/// from before and after a concurrent `reset`.
#[derive(Debug, Default)]
pub struct ApiMetrics {
    state: RwLock<MetricsState>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request
    pub fn record_request(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        success: bool,
        input_tokens: u64,
        output_tokens: u64,
    ) {
        let request = RequestMetrics {
            start_time,
            end_time,
            success,
            input_tokens,
            output_tokens,
        };

        let mut state = self.write();
        state.total_requests += 1;
        if success {
            state.successful_requests += 1;
        } else {
            state.failed_requests += 1;
        }
        state.total_latency_ms += request.latency_ms();
        state.total_input_tokens += input_tokens;
        state.total_output_tokens += output_tokens;

        state.recent.push_back(request);
        while state.recent.len() > RECENT_REQUEST_CAPACITY {
            state.recent.pop_front();
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.read().total_requests
    }

    pub fn successful_requests(&self) -> u64 {
        self.read().successful_requests
    }

    pub fn failed_requests(&self) -> u64 {
        self.read().failed_requests
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.read().total_input_tokens
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.read().total_output_tokens
    }

    /// Mean latency across all recorded requests, 0 when there are none
    pub fn average_latency_ms(&self) -> f64 {
        let state = self.read();
        if state.total_requests == 0 {
            return 0.0;
        }
        state.total_latency_ms as f64 / state.total_requests as f64
    }

    /// Oldest first
    pub fn recent_requests(&self) -> Vec<RequestMetrics> {
        self.read().recent.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.read();
        MetricsSnapshot {
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            total_latency_ms: state.total_latency_ms,
            total_input_tokens: state.total_input_tokens,
            total_output_tokens: state.total_output_tokens,
            recent_requests: state.recent.iter().cloned().collect(),
        }
    }

    pub fn reset(&self) {
        *self.write() = MetricsState::default();
    }

    fn read(&self) -> RwLockReadGuard<'_, MetricsState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Metrics lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MetricsState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Metrics lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
