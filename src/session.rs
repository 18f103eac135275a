// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent session: the model/tool loop
//!
//! An [`AgentSession`] owns everything one conversation needs: the provider,
//! the tool executor, request plumbing (rate limiter and retry), the active
//! mode, tool approval and the shared conversation itself.
//!
//! A user turn streams a model response, runs whatever tools the model asked
//! for, feeds the results back and repeats until the model answers without
//! tool calls or the round limit is hit.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{AgentError, Result};
use crate::llm::conversation::{Conversation, SharedConversation};
use crate::llm::message::{Message, Role};
use crate::llm::metrics::ApiMetrics;
use crate::llm::provider::{ApiProvider, StreamOptions, ToolCall};
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::retry::RetryStrategy;
use crate::llm::stream::{self, AssistantTurn};
use crate::modes::{Mode, ModeRegistry};
use crate::tools::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, AutoApprovalSettings, DenyAll, ToolApprover,
    ToolExecutor, ToolResult,
};

/// Default cap on model/tool round trips in one user turn
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 25;

/// How a user turn ended
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The last assistant message
    pub message: Message,
    /// Tool rounds run during the turn
    pub tool_rounds: u32,
    /// The turn stopped because `max_tool_rounds` was reached
    pub hit_round_limit: bool,
}

/// Builder for [`AgentSession`]
pub struct AgentSessionBuilder {
    provider: Arc<dyn ApiProvider>,
    executor: ToolExecutor,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryStrategy,
    mode: Mode,
    approval: AutoApprovalSettings,
    approver: Arc<dyn ToolApprover>,
    conversation: SharedConversation,
    text_sink: Option<mpsc::UnboundedSender<String>>,
    max_tool_rounds: u32,
}

impl AgentSessionBuilder {
    /// Apply retry, rate limit, approval, mode and round settings
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.retry = RetryStrategy::from(&settings.resilience);
        self.limiter = Some(Arc::new(RateLimiter::from_config(&settings.rate_limits)));
        self.approval = settings.auto_approval.clone();
        self.max_tool_rounds = settings.session.max_tool_rounds;
        match ModeRegistry::new().get(&settings.session.default_mode) {
            Some(mode) => self.mode = mode.clone(),
            None => tracing::warn!(
                mode = %settings.session.default_mode,
                "unknown default mode, keeping {}",
                self.mode.slug
            ),
        }
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn auto_approval(mut self, settings: AutoApprovalSettings) -> Self {
        self.approval = settings;
        self
    }

    /// Who decides on tool calls the policy does not auto-approve.
    /// Without one, such calls are denied.
    pub fn approver(mut self, approver: Arc<dyn ToolApprover>) -> Self {
        self.approver = approver;
        self
    }

    pub fn conversation(mut self, conversation: SharedConversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// Receive assistant text chunks as they stream in
    pub fn text_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.text_sink = Some(sink);
        self
    }

    pub fn max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn build(self) -> AgentSession {
        AgentSession {
            provider: self.provider,
            executor: self.executor,
            limiter: self.limiter,
            retry: self.retry,
            mode: self.mode,
            approval: Mutex::new(ApprovalGate::new(self.approval)),
            approver: self.approver,
            conversation: self.conversation,
            text_sink: self.text_sink,
            max_tool_rounds: self.max_tool_rounds,
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }
}

/// One conversation with a model and its tools
pub struct AgentSession {
    provider: Arc<dyn ApiProvider>,
    executor: ToolExecutor,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryStrategy,
    mode: Mode,
    approval: Mutex<ApprovalGate>,
    approver: Arc<dyn ToolApprover>,
    conversation: SharedConversation,
    text_sink: Option<mpsc::UnboundedSender<String>>,
    max_tool_rounds: u32,
    cancel: StdMutex<CancellationToken>,
}

impl AgentSession {
    pub fn builder(provider: Arc<dyn ApiProvider>, executor: ToolExecutor) -> AgentSessionBuilder {
        AgentSessionBuilder {
            provider,
            executor,
            limiter: None,
            retry: RetryStrategy::default(),
            mode: Mode::code(),
            approval: AutoApprovalSettings::default(),
            approver: Arc::new(DenyAll),
            conversation: SharedConversation::default(),
            text_sink: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn provider(&self) -> &Arc<dyn ApiProvider> {
        &self.provider
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        self.provider.metrics()
    }

    /// Run one user turn
    pub async fn send(&self, user_text: &str) -> Result<TurnOutcome> {
        let cancel = self.turn_token();
        self.conversation.append(Message::user(user_text)).await;
        tracing::debug!(mode = %self.mode.slug, "user turn started");
        self.run_loop(&cancel).await
    }

    /// Run a tool directly, record its result and ask the model to continue
    pub async fn execute_tool_and_continue(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<TurnOutcome> {
        let cancel = self.turn_token();
        let result = self
            .executor
            .execute_tool_with_cancel(name, args.clone(), &cancel)
            .await;
        self.conversation
            .append(Message::tool(name, args, result.to_json()))
            .await;
        self.run_loop(&cancel).await
    }

    /// Abort the in-flight request and tools. The next turn starts fresh.
    pub fn cancel(&self) {
        tracing::debug!("session cancelled");
        self.cancel_slot().cancel();
    }

    fn cancel_slot(&self) -> MutexGuard<'_, CancellationToken> {
        match self.cancel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Session cancel lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Token for a new turn, replacing one that was already cancelled
    fn turn_token(&self) -> CancellationToken {
        let mut slot = self.cancel_slot();
        if slot.is_cancelled() {
            *slot = CancellationToken::new();
        }
        slot.clone()
    }

    async fn run_loop(&self, cancel: &CancellationToken) -> Result<TurnOutcome> {
        let mut tool_rounds = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled("turn cancelled".to_string()));
            }

            let turn = self.request_turn(cancel).await?;
            let calls = turn.tool_calls.clone();
            let message = turn.into_message();
            self.conversation.append(message.clone()).await;

            if calls.is_empty() {
                return Ok(TurnOutcome {
                    message,
                    tool_rounds,
                    hit_round_limit: false,
                });
            }

            tool_rounds += 1;
            tracing::debug!(round = tool_rounds, calls = calls.len(), "running tool calls");
            for call in calls {
                self.run_tool_call(call, cancel).await;
            }

            if tool_rounds >= self.max_tool_rounds {
                tracing::warn!(
                    rounds = tool_rounds,
                    "stopping turn after reaching the tool round limit"
                );
                return Ok(TurnOutcome {
                    message,
                    tool_rounds,
                    hit_round_limit: true,
                });
            }
        }
    }

    /// Conversation as sent to the model. The mode's system prompt leads
    /// unless the conversation already carries a system message.
    async fn request_conversation(&self) -> Conversation {
        let snapshot = self.conversation.snapshot().await;
        if snapshot.messages().iter().any(|m| m.role == Role::System) {
            return snapshot;
        }
        let mut request = Conversation::with_system_message(self.mode.system_prompt());
        for message in snapshot.messages() {
            request.add_message(message.clone());
        }
        request
    }

    /// Stream one model response under the retry policy and rate limiter
    async fn request_turn(&self, cancel: &CancellationToken) -> Result<AssistantTurn> {
        let conversation = self.request_conversation().await;
        let tools = self
            .executor
            .registry()
            .descriptors_for_mode(&self.mode);
        let conversation = &conversation;
        let tools = &tools;
        // Text already relayed to the sink, kept across retried attempts
        let shown = &StdMutex::new(String::new());

        let turn = self
            .retry
            .execute_with_cancel(cancel, || async move {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled("turn cancelled".to_string()));
                }
                let options = StreamOptions::default()
                    .with_tools(tools.clone())
                    .with_cancel(cancel.clone());
                let attempt = async {
                    let events = self.provider.send_conversation_streaming(conversation, options);
                    let mut text = String::new();
                    stream::collect_with(events, |chunk| {
                        text.push_str(chunk);
                        self.relay(shown, &text);
                    })
                    .await
                };
                match &self.limiter {
                    Some(limiter) => limiter.execute_with_cancel(cancel, || attempt).await,
                    None => attempt.await,
                }
            })
            .await?;

        let shown = lock_relayed(shown);
        if !turn.text.starts_with(shown.as_str()) {
            // A retried attempt answered differently from what was already shown
            tracing::debug!(shown_len = shown.len(), "Retried response diverged from relayed text");
            self.emit("\n");
            self.emit(&turn.text);
        }
        Ok(turn)
    }

    /// Forward the part of `text` the sink has not seen yet.
    ///
    /// A retried attempt replays its text from the start; nothing is sent
    /// until it runs past what an earlier attempt already delivered.
    fn relay(&self, shown: &StdMutex<String>, text: &str) {
        let mut shown = lock_relayed(shown);
        if text.len() > shown.len() && text.starts_with(shown.as_str()) {
            let fresh = &text[shown.len()..];
            self.emit(fresh);
            shown.push_str(fresh);
        }
    }

    fn emit(&self, text: &str) {
        if let Some(sink) = &self.text_sink {
            // A dropped receiver only means nobody is watching.
            let _ = sink.send(text.to_string());
        }
    }

    async fn run_tool_call(&self, call: ToolCall, cancel: &CancellationToken) -> ToolResult {
        let request = ApprovalRequest {
            tool_name: call.name.clone(),
            args: call.input.clone(),
        };
        let decision = self
            .approval
            .lock()
            .await
            .check(&request, self.approver.as_ref())
            .await;

        let result = match decision {
            ApprovalDecision::Approve => {
                self.executor
                    .execute_tool_with_cancel(&call.name, call.input.clone(), cancel)
                    .await
            }
            ApprovalDecision::Deny => {
                tracing::debug!(tool = %call.name, "tool call denied");
                ToolResult::failure(format!("Tool call denied: {}", call.name))
            }
        };

        self.conversation
            .append(
                Message::tool(&call.name, call.input, result.to_json()).with_tool_use_id(call.id),
            )
            .await;
        result
    }
}

fn lock_relayed(shown: &StdMutex<String>) -> MutexGuard<'_, String> {
    match shown.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Relayed text lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
