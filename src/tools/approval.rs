// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Approval of tool calls
//!
//! Before the session runs a tool the model asked for, the call is either
//! auto-approved by policy or handed to a [`ToolApprover`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Which tools may run without asking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoApprovalSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_consecutive_requests")]
    pub max_consecutive_requests: u32,
    #[serde(default)]
    pub tools: HashMap<String, bool>,
}

fn default_max_consecutive_requests() -> u32 {
    3
}

impl Default for AutoApprovalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_consecutive_requests: default_max_consecutive_requests(),
            tools: HashMap::new(),
        }
    }
}

impl AutoApprovalSettings {
    /// Enabled policy that approves the listed tools
    pub fn allowing<'a>(tools: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            enabled: true,
            tools: tools.into_iter().map(|t| (t.to_string(), true)).collect(),
            ..Self::default()
        }
    }

    pub fn with_max_consecutive_requests(mut self, max: u32) -> Self {
        self.max_consecutive_requests = max;
        self
    }

    /// Whether `tool_name` is approved by policy
    pub fn should_auto_approve(&self, tool_name: &str) -> bool {
        self.enabled && self.tools.get(tool_name).copied().unwrap_or(false)
    }
}

/// A tool call waiting for a decision
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub tool_name: String,
    pub args: Value,
}

/// Decision on a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Deny,
}

/// Decides on tool calls the policy did not auto-approve
#[async_trait]
pub trait ToolApprover: Send + Sync {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl ToolApprover for ApproveAll {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

/// Denies everything
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ToolApprover for DenyAll {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Deny
    }
}

/// Asks on the terminal with a `[y]es / [n]o` prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalApprover;

#[async_trait]
impl ToolApprover for TerminalApprover {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision {
        let prompt = format!(
            "\nTool '{}' wants to run with {}\nAllow? [y]es / [n]o: ",
            request.tool_name, request.args
        );
        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() {
            return ApprovalDecision::Deny;
        }
        let _ = stderr.flush().await;

        let mut input = String::new();
        if BufReader::new(tokio::io::stdin())
            .read_line(&mut input)
            .await
            .is_err()
        {
            return ApprovalDecision::Deny;
        }

        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => ApprovalDecision::Approve,
            _ => ApprovalDecision::Deny,
        }
    }
}

/// Applies the policy, falling back to an approver.
///
/// After `max_consecutive_requests` auto-approvals in a row the gate asks the
/// approver instead; any explicit decision resets the streak.
#[derive(Debug)]
pub struct ApprovalGate {
    settings: AutoApprovalSettings,
    consecutive_auto_approvals: u32,
}

impl ApprovalGate {
    pub fn new(settings: AutoApprovalSettings) -> Self {
        Self {
            settings,
            consecutive_auto_approvals: 0,
        }
    }

    pub fn settings(&self) -> &AutoApprovalSettings {
        &self.settings
    }

    pub fn consecutive_auto_approvals(&self) -> u32 {
        self.consecutive_auto_approvals
    }

    /// Decide on `request`
    pub async fn check(
        &mut self,
        request: &ApprovalRequest,
        approver: &dyn ToolApprover,
    ) -> ApprovalDecision {
        if self.settings.should_auto_approve(&request.tool_name)
            && self.consecutive_auto_approvals < self.settings.max_consecutive_requests
        {
            self.consecutive_auto_approvals += 1;
            tracing::debug!(
                tool = %request.tool_name,
                streak = self.consecutive_auto_approvals,
                "auto-approved tool call"
            );
            return ApprovalDecision::Approve;
        }

        self.consecutive_auto_approvals = 0;
        approver.decide(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingApprover {
        calls: Arc<AtomicU32>,
        decision: ApprovalDecision,
    }

    #[async_trait]
    impl ToolApprover for CountingApprover {
        async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    fn request(tool: &str) -> ApprovalRequest {
        ApprovalRequest {
            tool_name: tool.to_string(),
            args: json!({}),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = AutoApprovalSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.max_consecutive_requests, 3);
        assert!(!settings.should_auto_approve("read_file"));
    }

    #[test]
    fn test_should_auto_approve_requires_enabled_and_listed() {
        let mut settings = AutoApprovalSettings::allowing(["read_file"]);
        assert!(settings.should_auto_approve("read_file"));
        assert!(!settings.should_auto_approve("execute_command"));

        settings.enabled = false;
        assert!(!settings.should_auto_approve("read_file"));
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: AutoApprovalSettings =
            serde_json::from_value(json!({"enabled": true, "tools": {"list_files": true}})).unwrap();
        assert_eq!(settings.max_consecutive_requests, 3);
        assert!(settings.should_auto_approve("list_files"));
    }

    #[tokio::test]
    async fn test_gate_asks_after_streak_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let approver = CountingApprover {
            calls: calls.clone(),
            decision: ApprovalDecision::Approve,
        };
        let mut gate = ApprovalGate::new(
            AutoApprovalSettings::allowing(["read_file"]).with_max_consecutive_requests(2),
        );

        for _ in 0..2 {
            assert_eq!(
                gate.check(&request("read_file"), &approver).await,
                ApprovalDecision::Approve
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        gate.check(&request("read_file"), &approver).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.consecutive_auto_approvals(), 0);

        gate.check(&request("read_file"), &approver).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gate_uses_approver_for_unlisted_tools() {
        let calls = Arc::new(AtomicU32::new(0));
        let approver = CountingApprover {
            calls: calls.clone(),
            decision: ApprovalDecision::Deny,
        };
        let mut gate = ApprovalGate::new(AutoApprovalSettings::allowing(["read_file"]));

        assert_eq!(
            gate.check(&request("execute_command"), &approver).await,
            ApprovalDecision::Deny
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fixed_approvers() {
        assert_eq!(ApproveAll.decide(&request("x")).await, ApprovalDecision::Approve);
        assert_eq!(DenyAll.decide(&request("x")).await, ApprovalDecision::Deny);
    }
}
