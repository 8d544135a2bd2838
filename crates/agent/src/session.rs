//! The conversation loop.
//!
//! A [`ConversationSession`] drives one `Agent::run` call:
//!
//! ```text
//! Preparing ──► Iterating(0) ──► Iterating(1) ──► … ──► Finalized
//!                    │                                   ▲
//!                    └──────────────► Failed ◄───────────┘ (on error)
//! ```
//!
//! Each iteration invokes the model once and, when it asks for tools, runs
//! one batch of tool calls. The session stops on a final answer, a tripped
//! duplicate-call guard, or one of the [`SessionError`] conditions.

use convoke_core::error::{Error, Result, SessionError};
use convoke_core::event::{TraceEvent, TraceEventKind};
use convoke_core::memory::Step;
use convoke_core::message::ChatMessage;
use convoke_core::model::{Completion, ToolSpec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::context::token::count_messages;
use crate::context::{BudgetWindow, CompactionPolicy, ContextBudgetManager, PromptEnvelope};
use crate::execution::{DuplicateCallGuard, ToolExecutor, sanitize_for_log};
use crate::stream::ChunkAggregator;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Preparing,
    Iterating(u32),
    Finalized,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finalized | SessionState::Failed)
    }
}

/// What handling one completion decided.
enum Turn {
    Continue,
    Finish(String),
}

/// One run of an agent over one input.
pub struct ConversationSession<'a> {
    agent: &'a Agent,
    cancel: &'a CancellationToken,
    input: String,
    state: SessionState,
    specs: Vec<ToolSpec>,
    messages: Vec<ChatMessage>,
    budget: ContextBudgetManager,
    executor: ToolExecutor,
    aggregator: ChunkAggregator,
    guard: DuplicateCallGuard,
    consecutive_errors: u32,
}

impl<'a> ConversationSession<'a> {
    pub fn new(agent: &'a Agent, input: &str, cancel: &'a CancellationToken) -> Self {
        let agent_id = agent.id.to_string();
        let registry = agent.tool_registry();
        let specs = registry.specs();

        let window = BudgetWindow::resolve(&agent.model_name, &agent.config, &agent.pricing);
        let budget = ContextBudgetManager::new(window, agent.counter.clone());

        let executor = ToolExecutor::new(agent_id.clone(), registry)
            .with_vars(agent.vars())
            .with_validator(agent.validator.clone())
            .with_error_handling(agent.error_handling.clone())
            .with_tracer(agent.tracer.clone())
            .with_notifier(agent.notifier());

        let aggregator = ChunkAggregator::new(agent.tracer.clone(), agent_id, agent.model_name.clone());

        Self {
            agent,
            cancel,
            input: input.to_string(),
            state: SessionState::Preparing,
            specs,
            messages: Vec::new(),
            budget,
            executor,
            aggregator,
            guard: DuplicateCallGuard::new(),
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The working message sequence as last sent to the model.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Drive the session to a terminal state.
    pub async fn run(&mut self) -> Result<String> {
        let result = self.drive().await;
        match &result {
            Ok(answer) => {
                self.state = SessionState::Finalized;
                info!(
                    agent_id = %self.agent.id,
                    chars = answer.len(),
                    tokens = self.agent.cost.total_tokens(),
                    "Session finished"
                );
            }
            Err(e) => {
                self.state = SessionState::Failed;
                warn!(agent_id = %self.agent.id, error = %e, "Session failed");
            }
        }
        result
    }

    async fn drive(&mut self) -> Result<String> {
        self.prepare().await?;

        let max_iterations = self.agent.max_iterations();
        let mut iteration: u32 = 0;
        loop {
            self.state = SessionState::Iterating(iteration);

            if let Some(max) = max_iterations
                && iteration >= max
            {
                return Err(SessionError::IterationCapExceeded(max).into());
            }
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled.into());
            }

            self.trace(
                TraceEventKind::StepStart,
                serde_json::json!({ "iteration": iteration }),
            );

            let messages = std::mem::take(&mut self.messages);
            self.messages = self.budget.trim(messages, &self.specs);

            let (completion, response_id) = self.invoke(iteration).await?;
            match self.handle(completion, &response_id).await? {
                Turn::Finish(answer) => return Ok(answer),
                Turn::Continue => iteration += 1,
            }
        }
    }

    async fn prepare(&mut self) -> Result<()> {
        let agent = self.agent;
        let config = &agent.config;
        info!(
            agent_id = %agent.id,
            model = %agent.model_name,
            tools = self.specs.len(),
            input = %sanitize_for_log(&self.input),
            "Starting session"
        );

        let history = agent.memory.history().await?;
        let compaction = CompactionPolicy::new(config.history_compact_after(), config.history_keep());
        let envelope = PromptEnvelope::new(self.specs.clone())
            .with_vars(agent.vars())
            .with_platform(agent.platform)
            .with_compaction(compaction);

        let messages = envelope.build(&agent.prompt, &self.input, &history);
        if compaction.applies_to(history.len()) {
            self.trace(
                TraceEventKind::Summary,
                serde_json::json!({
                    "history": history.len(),
                    "retained": compaction.keep.min(history.len()),
                }),
            );
        }

        self.messages = self.budget.trim(messages, &self.specs);
        debug!(
            agent_id = %agent.id,
            messages = self.messages.len(),
            target = self.budget.window().target,
            "Session ready"
        );
        Ok(())
    }

    /// Invoke the model once and fold its stream.
    async fn invoke(&mut self, iteration: u32) -> Result<(Completion, String)> {
        self.trace(
            TraceEventKind::ModelStart,
            serde_json::json!({
                "model": self.agent.model_name,
                "iteration": iteration,
                "messages": self.messages.len(),
            }),
        );

        let rx = self
            .agent
            .client
            .stream(self.cancel, &self.messages, &self.specs)
            .await?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled.into()),
            folded = self.aggregator.collect(rx) => folded.map_err(Error::from),
        }
    }

    async fn handle(&mut self, completion: Completion, response_id: &str) -> Result<Turn> {
        self.account(&completion)?;

        let Completion {
            content,
            tool_calls,
            ..
        } = completion;

        if response_id.is_empty() {
            self.messages
                .push(ChatMessage::assistant_with_tools(content.clone(), tool_calls.clone()));
        } else {
            debug!(agent_id = %self.agent.id, response_id, "Provider holds the assistant turn");
        }

        let mut step = Step::new(self.input.clone());
        step.output = content.clone();
        step.tool_calls = tool_calls.clone();

        if tool_calls.is_empty() {
            self.record(step).await?;
            return Ok(self.finish_text(content));
        }

        if let Some(message) = self.guard.observe(&tool_calls) {
            warn!(agent_id = %self.agent.id, "Stopping on repeated tool calls");
            self.record(step).await?;
            self.trace_final(&message);
            return Ok(Turn::Finish(message));
        }

        let outcome = self.executor.execute(self.cancel, &tool_calls, &mut step).await?;

        let all_terminal = tool_calls.iter().all(|c| self.executor.is_terminal(&c.name));
        if !outcome.had_errors && all_terminal && !outcome.messages.is_empty() {
            let answer = outcome
                .messages
                .iter()
                .map(|m| m.content.as_str())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            if !answer.is_empty() {
                debug!(agent_id = %self.agent.id, "Terminal tools answered directly");
                self.record(step).await?;
                self.trace_final(&answer);
                return Ok(Turn::Finish(answer));
            }
        }

        self.messages.extend(outcome.messages);
        self.record(step).await?;

        if outcome.had_errors {
            self.consecutive_errors += 1;
        } else {
            self.consecutive_errors = 0;
        }
        let limit = self.agent.error_handling.max_error_retries;
        if self.consecutive_errors > limit {
            warn!(
                agent_id = %self.agent.id,
                errors = self.consecutive_errors,
                limit,
                "Too many consecutive tool errors"
            );
            return Err(SessionError::TooManyConsecutiveErrors(self.consecutive_errors).into());
        }

        Ok(Turn::Continue)
    }

    /// A tool-free answer: follow up on a bare plan, else validate and finish.
    fn finish_text(&mut self, content: String) -> Turn {
        let agent = self.agent;
        if agent.config.plan_heuristic()
            && !self.specs.is_empty()
            && agent.plan_policy.should_follow_up(&content, true)
        {
            debug!(agent_id = %agent.id, "Answer looks like a plan, asking the model to act");
            self.messages
                .push(ChatMessage::system(agent.plan_policy.message()));
            return Turn::Continue;
        }

        if let Err(e) = agent.validator.validate_agent_output(&content) {
            warn!(agent_id = %agent.id, error = %e, "Final output failed validation");
            let notice = format!("Agent completed task but output validation failed: {e}");
            self.trace_final(&notice);
            return Turn::Finish(notice);
        }

        self.trace_final(&content);
        Turn::Finish(content)
    }

    /// Charge the completion to the cost tracker, counting locally when the
    /// provider reported no usage.
    fn account(&self, completion: &Completion) -> Result<()> {
        let agent = self.agent;
        let input_tokens = match completion.input_tokens {
            0 => count_messages(agent.counter.as_ref(), &self.messages),
            n => n,
        };
        let output_tokens = match completion.output_tokens {
            0 => agent.counter.count(&completion.content),
            n => n,
        };
        let model = match completion.model_name.trim() {
            "" => agent.model_name.as_str(),
            name => name,
        };

        let over = agent.cost.add_model_usage(model, input_tokens, output_tokens);
        if over && agent.config.stop_on_budget() {
            return Err(SessionError::BudgetExceeded {
                tokens: agent.cost.total_tokens(),
                cost: agent.cost.total_cost(),
            }
            .into());
        }
        Ok(())
    }

    async fn record(&self, step: Step) -> Result<()> {
        self.agent.memory.add_step(step).await?;
        Ok(())
    }

    fn trace_final(&self, answer: &str) {
        self.trace(
            TraceEventKind::Final,
            serde_json::json!({ "content": answer }),
        );
    }

    fn trace(&self, kind: TraceEventKind, data: serde_json::Value) {
        self.agent
            .tracer
            .write(TraceEvent::new(kind, self.agent.id.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convoke_config::RuntimeConfig;
    use convoke_core::message::{Role, ToolCall};

    use super::*;
    use crate::scripted::{ScriptedClient, text_turn, tool_turn};
    use crate::test_helpers::NamedTool;

    fn agent(client: Arc<ScriptedClient>) -> Agent {
        Agent::builder(client, "gpt-4o")
            .config(RuntimeConfig::isolated())
            .tool(Arc::new(NamedTool::new("lookup", "42")))
            .build()
    }

    #[tokio::test]
    async fn text_answer_finalizes_in_one_iteration() {
        let client = Arc::new(ScriptedClient::new(vec![text_turn("Hello there")]));
        let agent = agent(client.clone());
        let cancel = CancellationToken::new();

        let mut session = ConversationSession::new(&agent, "hi", &cancel);
        assert_eq!(session.state(), SessionState::Preparing);
        let answer = session.run().await.unwrap();

        assert_eq!(answer, "Hello there");
        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(client.call_count(), 1);
        assert_eq!(agent.memory().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tool_results_feed_the_next_invocation() {
        let client = Arc::new(ScriptedClient::new(vec![
            tool_turn(vec![ToolCall::new("c1", "lookup", "{}")]),
            text_turn("The answer is 42"),
        ]));
        let agent = agent(client.clone());
        let cancel = CancellationToken::new();

        let mut session = ConversationSession::new(&agent, "what is it?", &cancel);
        let answer = session.run().await.unwrap();
        assert_eq!(answer, "The answer is 42");

        let second = &client.requests()[1];
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(tool_msg.content, "42");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(agent.memory().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_usage_is_counted_locally() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            Ok(convoke_core::model::StreamChunk::delta("abcdefgh")),
            Ok(convoke_core::model::StreamChunk::done()),
        ]]));
        let agent = agent(client);
        agent.run("hello", &CancellationToken::new()).await.unwrap();

        let usage = agent.cost().usage_for("gpt-4o").unwrap();
        assert!(usage.input_tokens > 0);
        assert_eq!(usage.output_tokens, 2);
    }

    #[tokio::test]
    async fn failed_session_reports_failed_state() {
        let client = Arc::new(ScriptedClient::new(vec![vec![Err(
            convoke_core::error::ModelError::StreamInterrupted("reset".into()),
        )]]));
        let agent = agent(client);
        let cancel = CancellationToken::new();
        let mut session = ConversationSession::new(&agent, "hi", &cancel);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.state().is_terminal());
        assert_eq!(agent.memory().len().await.unwrap(), 0);
    }
}
