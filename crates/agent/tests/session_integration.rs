//! End-to-end tests for the conversation runtime.
//!
//! Each test wires a real `Agent` to a scripted model client and the
//! built-in tools, then drives a full session through `Agent::run`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoke_agent::context::budget::BudgetWindow;
use convoke_agent::{
    Agent, ContextBudgetManager, HeuristicCounter, NoopNotifier, PLAN_FOLLOW_UP, ScriptedClient,
};
use convoke_config::RuntimeConfig;
use convoke_core::error::{Error, SessionError, ToolError};
use convoke_core::event::TraceEventKind;
use convoke_core::memory::Step;
use convoke_core::message::{ChatMessage, Role, ToolCall};
use convoke_core::model::StreamChunk;
use convoke_core::tool::Tool;
use convoke_core::ErrorHandlingConfig;
use convoke_memory::InMemoryStore;
use convoke_telemetry::{CollectingTracer, CostTracker, PricingTable};
use convoke_tools::default_registry;
use tokio_util::sync::CancellationToken;

// ── Script helpers ──────────────────────────────────────────────────────

type Turn = Vec<Result<StreamChunk, convoke_core::error::ModelError>>;

fn text(answer: &str) -> Turn {
    vec![
        Ok(StreamChunk::delta(answer)),
        Ok(StreamChunk::done().with_usage(10, 5)),
    ]
}

fn calls(calls: Vec<ToolCall>) -> Turn {
    vec![Ok(StreamChunk::done().with_tool_calls(calls).with_usage(10, 5))]
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

fn agent_with(client: Arc<ScriptedClient>, config: RuntimeConfig) -> Agent {
    Agent::builder(client, "gpt-4o")
        .config(config)
        .tools(default_registry(None))
        .notifier(Arc::new(NoopNotifier))
        .build()
}

fn agent(client: Arc<ScriptedClient>) -> Agent {
    agent_with(client, RuntimeConfig::isolated())
}

// ── Test tools ──────────────────────────────────────────────────────────

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        Err(ToolError::Failed("disk on fire".into()))
    }
}

struct SleepyTool;

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }
    fn description(&self) -> &str {
        "Sleeps for a minute"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _: serde_json::Value, _: &CancellationToken) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("woke up".into())
    }
}

// ── Basic flow ──────────────────────────────────────────────────────────

#[tokio::test]
async fn calculator_round_trip() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "calculator", serde_json::json!({"expression": "6 * 7"}))]),
        text("6 times 7 is 42."),
    ]));
    let agent = agent(client.clone());

    let answer = agent.run("What is 6*7?", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "6 times 7 is 42.");
    assert_eq!(client.call_count(), 2);

    let second = &client.requests()[1];
    assert_eq!(second[0].role, Role::System);
    let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_msg.content, "6 * 7 = 42");

    let history = agent.memory().history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tool_results["c1"], "6 * 7 = 42");
    assert_eq!(history[1].output, "6 times 7 is 42.");
    assert_eq!(agent.cost().total_tokens(), 30);
}

#[tokio::test]
async fn second_run_replays_the_previous_step() {
    let client = Arc::new(ScriptedClient::new(vec![text("Paris."), text("About 2 million.")]));
    let agent = agent(client.clone());
    let cancel = CancellationToken::new();

    agent.run("Capital of France?", &cancel).await.unwrap();
    agent.run("Population?", &cancel).await.unwrap();

    let second = &client.requests()[1];
    let contents: Vec<&str> = second.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents[1..], ["Capital of France?", "Paris.", "Population?"]);
}

// ── Duplicate-call termination ──────────────────────────────────────────

#[tokio::test]
async fn identical_calls_stop_the_session() {
    let ping = || calls(vec![call("c", "echo", serde_json::json!({"text": "ping"}))]);
    let client = Arc::new(ScriptedClient::new(vec![ping(), ping(), ping(), text("never")]));
    let agent = agent(client.clone());

    let answer = agent.run("loop", &CancellationToken::new()).await.unwrap();
    assert_eq!(
        answer,
        "Task completed. Detected repeated tool execution (echo), stopping to prevent infinite loop."
    );
    assert_eq!(client.call_count(), 3);
    assert_eq!(client.remaining(), 1);

    // The tripping turn is recorded but its calls never ran.
    let history = agent.memory().history().await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[2].tool_results.is_empty());
}

#[tokio::test]
async fn varied_arguments_keep_going() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("a", "echo", serde_json::json!({"text": "one"}))]),
        calls(vec![call("b", "echo", serde_json::json!({"text": "two"}))]),
        calls(vec![call("c", "echo", serde_json::json!({"text": "three"}))]),
        text("done"),
    ]));
    let agent = agent(client.clone());
    assert_eq!(agent.run("go", &CancellationToken::new()).await.unwrap(), "done");
    assert_eq!(client.call_count(), 4);
}

// ── Error policy ────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_failure_becomes_a_tool_result() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "broken", serde_json::json!({}))]),
        text("The disk is on fire."),
    ]));
    let agent = agent(client.clone());
    agent.register_tool(Arc::new(BrokenTool));

    let answer = agent.run("check disk", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "The disk is on fire.");

    let second = &client.requests()[1];
    let results: Vec<&ChatMessage> = second.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("Error executing tool 'broken': disk on fire"));

    let history = agent.memory().history().await.unwrap();
    assert!(history[0].tool_results["c1"].contains("disk on fire"));
}

#[tokio::test]
async fn strict_policy_aborts_without_recording() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "broken", serde_json::json!({}))]),
        text("unreachable"),
    ]));
    let agent = Agent::builder(client.clone(), "gpt-4o")
        .config(RuntimeConfig::isolated())
        .tool(Arc::new(BrokenTool))
        .error_handling(ErrorHandlingConfig::strict())
        .notifier(Arc::new(NoopNotifier))
        .build();

    let err = agent.run("check disk", &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Tool(ToolError::ExecutionFailed { ref tool_name, .. }) if tool_name == "broken"
    ));
    assert_eq!(client.call_count(), 1);
    assert_eq!(agent.memory().len().await.unwrap(), 0);
}

#[tokio::test]
async fn consecutive_failures_escalate() {
    let fail = |id: &str| calls(vec![call(id, "broken", serde_json::json!({"attempt": id}))]);
    let client = Arc::new(ScriptedClient::new(vec![fail("1"), fail("2"), fail("3")]));
    let agent = Agent::builder(client.clone(), "gpt-4o")
        .config(RuntimeConfig::isolated())
        .tool(Arc::new(BrokenTool))
        .error_handling(ErrorHandlingConfig {
            max_error_retries: 1,
            ..ErrorHandlingConfig::default()
        })
        .notifier(Arc::new(NoopNotifier))
        .build();

    let err = agent.run("retry", &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.session(), Some(&SessionError::TooManyConsecutiveErrors(2)));
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn unknown_tool_lists_what_is_available() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "teleport", serde_json::json!({"to": "mars"}))]),
        text("I cannot teleport."),
    ]));
    let agent = agent(client.clone());

    let answer = agent.run("go to mars", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "I cannot teleport.");

    let second = &client.requests()[1];
    let result = second.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(result.content.contains("Unknown tool 'teleport'"));
    for name in ["calculator", "echo", "final_answer"] {
        assert!(result.content.contains(name), "missing {name}");
    }
}

#[tokio::test]
async fn malformed_arguments_are_soft() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![ToolCall::new("c1", "echo", "{not json")]),
        text("retrying later"),
    ]));
    let agent = agent(client.clone());

    agent.run("echo", &CancellationToken::new()).await.unwrap();
    let result = client.requests()[1]
        .iter()
        .find(|m| m.role == Role::Tool)
        .cloned()
        .unwrap();
    assert!(result.content.starts_with("Error: Invalid tool arguments for 'echo'"));
}

// ── Terminal tools ──────────────────────────────────────────────────────

#[tokio::test]
async fn terminal_tool_short_circuits() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "final_answer", serde_json::json!({"answer": "Paris"}))]),
        text("unreachable"),
    ]));
    let agent = agent(client.clone());

    let answer = agent.run("Capital?", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "Paris");
    assert_eq!(client.call_count(), 1);
    assert_eq!(agent.memory().len().await.unwrap(), 1);
}

#[tokio::test]
async fn mixed_batch_goes_back_to_the_model() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![
            call("c1", "echo", serde_json::json!({"text": "noted"})),
            call("c2", "final_answer", serde_json::json!({"answer": "Paris"})),
        ]),
        text("Paris, noted."),
    ]));
    let agent = agent(client.clone());

    let answer = agent.run("Capital?", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "Paris, noted.");
    assert_eq!(client.call_count(), 2);
}

// ── Session limits ──────────────────────────────────────────────────────

#[tokio::test]
async fn iteration_cap_is_a_hard_ceiling() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("a", "echo", serde_json::json!({"text": "a"}))]),
        calls(vec![call("b", "echo", serde_json::json!({"text": "b"}))]),
        text("unreachable"),
    ]));
    let agent = Agent::builder(client.clone(), "gpt-4o")
        .config(RuntimeConfig::isolated())
        .tools(default_registry(None))
        .max_iterations(2)
        .notifier(Arc::new(NoopNotifier))
        .build();

    let err = agent.run("go", &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.session(), Some(&SessionError::IterationCapExceeded(2)));
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn cancelled_before_start_makes_no_calls() {
    let client = Arc::new(ScriptedClient::new(vec![text("unreachable")]));
    let agent = agent(client.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = agent.run("hi", &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(client.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_running_tool() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![
            call("c1", "sleepy", serde_json::json!({})),
            call("c2", "echo", serde_json::json!({"text": "after"})),
        ]),
        text("unreachable"),
    ]));
    let agent = agent(client.clone());
    agent.register_tool(Arc::new(SleepyTool));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = agent.run("nap", &cancel).await.unwrap_err();
    assert_eq!(err.session(), Some(&SessionError::Cancelled));
    assert_eq!(client.call_count(), 1);
    assert_eq!(agent.memory().len().await.unwrap(), 0);
}

#[tokio::test]
async fn budget_stop_fails_the_session() {
    let client = Arc::new(ScriptedClient::new(vec![text("expensive answer")]));
    let pricing = Arc::new(PricingTable::with_defaults());
    let cost = Arc::new(CostTracker::new(pricing).with_budget(10, 0.0));
    let config = RuntimeConfig {
        stop_on_budget: Some(true),
        ..RuntimeConfig::isolated()
    };
    let agent = Agent::builder(client, "gpt-4o")
        .config(config)
        .cost(cost)
        .build();

    let err = agent.run("hi", &CancellationToken::new()).await.unwrap_err();
    match err.session() {
        Some(SessionError::BudgetExceeded { tokens, .. }) => assert_eq!(*tokens, 15),
        other => panic!("expected budget error, got {other:?}"),
    }
}

#[tokio::test]
async fn over_budget_without_stop_still_answers() {
    let client = Arc::new(ScriptedClient::new(vec![text("fine")]));
    let cost = Arc::new(CostTracker::new(Arc::new(PricingTable::with_defaults())).with_budget(10, 0.0));
    let agent = Agent::builder(client, "gpt-4o")
        .config(RuntimeConfig::isolated())
        .cost(cost)
        .build();

    assert_eq!(agent.run("hi", &CancellationToken::new()).await.unwrap(), "fine");
    assert!(agent.cost().over_budget());
}

// ── Plan follow-up ──────────────────────────────────────────────────────

#[tokio::test]
async fn plan_answers_are_pushed_back_when_enabled() {
    let client = Arc::new(ScriptedClient::new(vec![
        text("Here is my plan: compute 2+2 with the calculator."),
        calls(vec![call("c1", "calculator", serde_json::json!({"expression": "2+2"}))]),
        text("It is 4."),
    ]));
    let config = RuntimeConfig {
        plan_heuristic: Some(true),
        ..RuntimeConfig::isolated()
    };
    let agent = agent_with(client.clone(), config);

    let answer = agent.run("2+2?", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "It is 4.");

    let second = &client.requests()[1];
    let last = second.last().unwrap();
    assert_eq!(last.role, Role::System);
    assert_eq!(last.content, PLAN_FOLLOW_UP);
}

#[tokio::test]
async fn plan_answers_finish_when_disabled() {
    let client = Arc::new(ScriptedClient::new(vec![text("My plan is to think.")]));
    let agent = agent(client.clone());
    let answer = agent.run("2+2?", &CancellationToken::new()).await.unwrap();
    assert_eq!(answer, "My plan is to think.");
    assert_eq!(client.call_count(), 1);
}

// ── Output validation ───────────────────────────────────────────────────

#[tokio::test]
async fn echoing_output_fails_validation() {
    let block = "alpha\nbeta\ngamma\ndelta\nepsilon";
    let looping = format!("{block}\n{block}");
    let client = Arc::new(ScriptedClient::new(vec![text(&looping)]));
    let agent = agent(client);

    let answer = agent.run("say it", &CancellationToken::new()).await.unwrap();
    assert!(answer.starts_with("Agent completed task but output validation failed:"));
}

// ── Conversation linking ────────────────────────────────────────────────

#[tokio::test]
async fn linked_responses_skip_the_local_assistant_message() {
    let client = Arc::new(ScriptedClient::new(vec![
        vec![Ok(StreamChunk::done()
            .with_tool_calls(vec![call("c1", "echo", serde_json::json!({"text": "hi"}))])
            .with_usage(10, 5)
            .with_response_id("resp_1"))],
        text("done"),
    ]));
    let agent = agent(client.clone());
    agent.run("greet", &CancellationToken::new()).await.unwrap();

    let second = &client.requests()[1];
    assert!(second.iter().all(|m| m.role != Role::Assistant));
    let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
}

// ── History compaction ──────────────────────────────────────────────────

#[tokio::test]
async fn long_history_is_compacted_into_a_summary() {
    let steps: Vec<Step> = (0..5)
        .map(|i| {
            let mut step = Step::new(format!("question {i}"));
            step.output = format!("answer {i}");
            step.tool_calls = vec![call(&format!("c{i}"), "echo", serde_json::json!({"text": i}))];
            step.tool_results.insert(format!("c{i}"), format!("echo {i}"));
            step
        })
        .collect();
    let client = Arc::new(ScriptedClient::new(vec![text("ok")]));
    let tracer = Arc::new(CollectingTracer::new());
    let config = RuntimeConfig {
        history_compact_after: Some(3),
        history_keep: Some(2),
        ..RuntimeConfig::isolated()
    };
    let agent = Agent::builder(client.clone(), "gpt-4o")
        .config(config)
        .memory(Arc::new(InMemoryStore::with_steps(steps)))
        .tracer(tracer.clone())
        .build();

    agent.run("next", &CancellationToken::new()).await.unwrap();

    let first = &client.requests()[0];
    assert_eq!(first[1].role, Role::System);
    assert!(first[1].content.starts_with(
        "[HISTORY COMPACTED] Earlier 3 steps summarized (3 tool calls). Top tools: echo x3."
    ));
    assert_eq!(first[2].content, "question 4");
    assert_eq!(tracer.count(TraceEventKind::Summary), 1);
}

// ── Tracing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn trace_events_follow_the_loop() {
    let client = Arc::new(ScriptedClient::new(vec![
        calls(vec![call("c1", "echo", serde_json::json!({"text": "hi"}))]),
        text("hi"),
    ]));
    let tracer = Arc::new(CollectingTracer::new());
    let agent = Agent::builder(client, "gpt-4o")
        .config(RuntimeConfig::isolated())
        .tools(default_registry(None))
        .tracer(tracer.clone())
        .notifier(Arc::new(NoopNotifier))
        .build();

    agent.run("say hi", &CancellationToken::new()).await.unwrap();

    use TraceEventKind::*;
    assert_eq!(
        tracer.kinds(),
        vec![StepStart, ModelStart, ToolStart, ToolEnd, StepStart, ModelStart, Token, Final]
    );
    let agent_id = agent.id().to_string();
    assert!(tracer.events().iter().all(|e| e.agent_id == agent_id));
}

// ── Derived agents ──────────────────────────────────────────────────────

#[tokio::test]
async fn spawned_agent_runs_with_its_own_memory() {
    let client = Arc::new(ScriptedClient::new(vec![text("parent"), text("child")]));
    let parent = agent(client.clone());
    let cancel = CancellationToken::new();

    parent.run("first", &cancel).await.unwrap();
    let child = parent.spawn();
    assert_eq!(child.run("second", &cancel).await.unwrap(), "child");

    assert_eq!(parent.memory().len().await.unwrap(), 1);
    assert_eq!(child.memory().len().await.unwrap(), 1);
    assert_eq!(child.cost().total_tokens(), 15);
    assert_eq!(parent.cost().total_tokens(), 15);

    // No replay of the parent's step in the child's first request.
    let child_request = &client.requests()[1];
    assert_eq!(child_request.len(), 2);
}

// ── Budget scenario ─────────────────────────────────────────────────────

#[test]
fn filler_is_blanked_to_fit_a_small_target() {
    let mut messages = vec![ChatMessage::system("You are terse.")];
    for i in 0..10 {
        messages.push(ChatMessage::assistant_with_tools(
            "x".repeat(180),
            vec![ToolCall::new(format!("f{i}"), "echo", "{}")],
        ));
    }
    messages.push(ChatMessage::user("final question"));

    let manager = ContextBudgetManager::new(BudgetWindow::with_target(200), Arc::new(HeuristicCounter));
    assert!(manager.measure(&messages, &[]) > 200);

    let trimmed = manager.trim(messages, &[]);
    assert!(manager.measure(&trimmed, &[]) <= 200);
    assert_eq!(trimmed.first().unwrap().content, "You are terse.");
    assert_eq!(trimmed.last().unwrap().content, "final question");
    assert!(trimmed.len() < 12);
}
