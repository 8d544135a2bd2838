//! `convoke replay`: run one session against a scripted model.

use std::path::PathBuf;
use std::sync::Arc;

use convoke_agent::{AgentBuilder, ScriptedClient};
use convoke_config::AppConfig;
use convoke_core::event::{NoopTracer, Tracer};
use convoke_telemetry::JsonlTracer;
use tokio_util::sync::CancellationToken;

use crate::script::load_script;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub script: PathBuf,
    pub input: String,
    pub model: Option<String>,
    pub trace: bool,
    pub max_iterations: Option<u32>,
}

/// What a finished replay produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub answer: String,
    pub model_calls: usize,
    pub steps: usize,
    pub tokens: u64,
    pub cost_usd: f64,
}

pub async fn run(config: AppConfig, opts: ReplayOptions) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(load_script(&opts.script)?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = replay(&config, &opts, client, &cancel).await?;

    println!("{}", report.answer);
    eprintln!();
    eprintln!(
        "  {} steps, {} model calls, {} tokens, ${:.6}",
        report.steps, report.model_calls, report.tokens, report.cost_usd
    );
    Ok(())
}

/// Build an agent over the built-in tools and drive one session.
pub async fn replay(
    config: &AppConfig,
    opts: &ReplayOptions,
    client: Arc<ScriptedClient>,
    cancel: &CancellationToken,
) -> convoke_core::Result<ReplayReport> {
    let mut config = config.clone();
    if let Some(model) = &opts.model {
        config.default_model = model.clone();
    }

    let tracer: Arc<dyn Tracer> = if opts.trace {
        Arc::new(JsonlTracer::stderr())
    } else {
        Arc::new(NoopTracer)
    };

    let mut builder = AgentBuilder::from_app_config(client.clone(), &config)
        .name("replay")
        .tools(convoke_tools::default_registry(None))
        .tracer(tracer);
    if let Some(max) = opts.max_iterations {
        builder = builder.max_iterations(max);
    }
    let agent = builder.build();

    let answer = agent.run(&opts.input, cancel).await?;
    let steps = agent.memory().len().await?;

    Ok(ReplayReport {
        answer,
        model_calls: client.call_count(),
        steps,
        tokens: agent.cost().total_tokens(),
        cost_usd: agent.cost().total_cost(),
    })
}
