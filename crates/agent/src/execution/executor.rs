//! Sequential tool-call execution.

use std::collections::HashMap;
use std::sync::Arc;

use convoke_core::error::{Error, SessionError, ToolError};
use convoke_core::event::{NoopTracer, TraceEvent, TraceEventKind, Tracer};
use convoke_core::memory::Step;
use convoke_core::message::{ChatMessage, ToolCall};
use convoke_core::tool::{Tool, ToolRegistry};
use convoke_core::ErrorHandlingConfig;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::notifier::{NoopNotifier, ToolNotifier, arg_summary};
use super::redact::sanitize_for_log;
use crate::context::substitute_value;
use crate::validator::OutputValidator;

/// What a batch of tool calls produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// One tool-result message per call that reached an outcome, in call order
    pub messages: Vec<ChatMessage>,
    /// Whether any call ended in a soft failure
    pub had_errors: bool,
}

/// Runs the tool calls of one turn, one at a time, in order.
///
/// Unknown tools and malformed or rejected arguments always come back as
/// tool-result text the model can react to. A failing tool does too when
/// `treat_errors_as_results` is set; otherwise it aborts the batch.
pub struct ToolExecutor {
    agent_id: String,
    tools: ToolRegistry,
    vars: HashMap<String, String>,
    validator: OutputValidator,
    error_handling: ErrorHandlingConfig,
    tracer: Arc<dyn Tracer>,
    notifier: Arc<dyn ToolNotifier>,
}

impl ToolExecutor {
    pub fn new(agent_id: impl Into<String>, tools: ToolRegistry) -> Self {
        Self {
            agent_id: agent_id.into(),
            tools,
            vars: HashMap::new(),
            validator: OutputValidator::default(),
            error_handling: ErrorHandlingConfig::default(),
            tracer: Arc::new(NoopTracer),
            notifier: Arc::new(NoopNotifier),
        }
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_validator(mut self, validator: OutputValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_error_handling(mut self, config: ErrorHandlingConfig) -> Self {
        self.error_handling = config;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ToolNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Whether `name` resolves to a tool that produces final answers.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.tools.use_tool(name).is_some_and(|t| t.is_terminal())
    }

    /// Execute `calls` in order, recording each outcome in `step`.
    ///
    /// Cancellation is checked before every call and while a call runs.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        calls: &[ToolCall],
        step: &mut Step,
    ) -> Result<ExecutionOutcome, Error> {
        let mut outcome = ExecutionOutcome {
            messages: Vec::with_capacity(calls.len()),
            had_errors: false,
        };

        for call in calls {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled.into());
            }

            let (tool, args) = match self.prepare(call) {
                Ok(prepared) => prepared,
                Err(e) => {
                    warn!(
                        agent_id = %self.agent_id,
                        tool = %call.name,
                        error = %sanitize_for_log(&e.to_string()),
                        "Rejected tool call"
                    );
                    outcome.had_errors = true;
                    record(&mut outcome, step, &call.id, format!("Error: {e}"));
                    continue;
                }
            };

            match self.run(cancel, call, tool, args).await? {
                RunResult::Success(content) => record(&mut outcome, step, &call.id, content),
                RunResult::SoftFailure(content) => {
                    outcome.had_errors = true;
                    record(&mut outcome, step, &call.id, content);
                }
            }
        }

        Ok(outcome)
    }

    fn prepare(&self, call: &ToolCall) -> Result<(Arc<dyn Tool>, Map<String, Value>), ToolError> {
        let tool = self
            .tools
            .use_tool(&call.name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
                available: self.tools.names(),
            })?;

        let invalid = |reason: String| ToolError::InvalidArguments {
            tool_name: call.name.clone(),
            reason,
        };

        let raw = call.arguments.trim();
        let parsed: Value = if raw.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?
        };
        let Value::Object(mut args) = parsed else {
            return Err(invalid("expected a JSON object".into()));
        };

        for value in args.values_mut() {
            substitute_value(value, &self.vars);
        }
        self.validator
            .validate_tool_args(&args)
            .map_err(|e| invalid(e.to_string()))?;

        Ok((tool, args))
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        call: &ToolCall,
        tool: Arc<dyn Tool>,
        args: Map<String, Value>,
    ) -> Result<RunResult, Error> {
        let args_json = Value::Object(args.clone()).to_string();
        debug!(
            agent_id = %self.agent_id,
            tool = %call.name,
            call_id = %call.id,
            args = %sanitize_for_log(&args_json),
            "Executing tool"
        );
        self.trace(
            TraceEventKind::ToolStart,
            serde_json::json!({ "name": call.name, "args": args }),
        );
        self.notifier
            .start(&self.agent_id, &call.name, &arg_summary(&args));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled.into()),
            r = tool.execute(Value::Object(args), cancel) => r,
        };

        match result {
            Err(e) => {
                let text = e.to_string();
                debug!(tool = %call.name, error = %sanitize_for_log(&text), "Tool failed");
                self.trace(
                    TraceEventKind::ToolEnd,
                    serde_json::json!({ "name": call.name, "error": text }),
                );
                self.notifier.failure(&self.agent_id, &call.name, &text);

                let message = self.format_error(&call.name, &args_json, &text);
                if self.error_handling.treat_errors_as_results {
                    Ok(RunResult::SoftFailure(message))
                } else {
                    Err(ToolError::ExecutionFailed {
                        tool_name: call.name.clone(),
                        message,
                    }
                    .into())
                }
            }
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    bytes = output.len(),
                    result = %sanitize_for_log(&output),
                    "Tool completed"
                );
                self.trace(
                    TraceEventKind::ToolEnd,
                    serde_json::json!({ "name": call.name, "result": output }),
                );
                self.notifier.success(&self.agent_id, &call.name);

                self.validator.validate_tool_response(&output).map_err(|e| {
                    ToolError::InvalidResponse {
                        tool_name: call.name.clone(),
                        reason: e.to_string(),
                    }
                })?;

                Ok(RunResult::Success(normalize_result(
                    &call.name, &args_json, output,
                )))
            }
        }
    }

    fn format_error(&self, name: &str, args_json: &str, error: &str) -> String {
        if !self.error_handling.include_error_context {
            return format!("Error executing tool '{name}': {error}");
        }
        format!(
            "Error executing tool '{name}': {error}\n\nContext:\n- Tool: {name}\n- Arguments: {args_json}\n- Suggestion: Please try a different approach or check the tool usage."
        )
    }

    fn trace(&self, kind: TraceEventKind, data: Value) {
        self.tracer.write(TraceEvent::new(kind, &self.agent_id, data));
    }
}

enum RunResult {
    Success(String),
    SoftFailure(String),
}

fn record(outcome: &mut ExecutionOutcome, step: &mut Step, id: &str, content: String) {
    step.tool_results.insert(id.to_string(), content.clone());
    outcome.messages.push(ChatMessage::tool_result(id, content));
}

/// Replace a blank tool result with a short default keyed by tool name.
pub fn normalize_result(name: &str, args_json: &str, result: String) -> String {
    if !result.trim().is_empty() {
        return result;
    }
    match name {
        "bash" | "sh" | "shell" => "Command executed successfully.".into(),
        "create" => {
            let path = serde_json::from_str::<Value>(args_json)
                .ok()
                .and_then(|v| v.get("path").and_then(Value::as_str).map(str::to_string));
            match path {
                Some(p) => format!("File '{p}' created successfully."),
                None => "File created successfully.".into(),
            }
        }
        "edit_range" | "search_replace" => "File edited successfully.".into(),
        _ => "Operation completed successfully.".into(),
    }
}
