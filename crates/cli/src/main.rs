//! Convoke CLI: the main entry point.
//!
//! Commands:
//! - `replay`   Run a session against a scripted model transcript
//! - `budget`   Show the resolved context window for a model
//! - `pricing`  List model prices and context limits
//! - `config`   Show, locate or check the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use convoke::commands::{self, load_config};

#[derive(Parser)]
#[command(
    name = "convoke",
    about = "Convoke: agent conversation runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.convoke/config.toml
    #[arg(long, global = true, env = "CONVOKE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted model transcript through a real session
    Replay {
        /// JSON script: an array of turns, each an array of stream fragments
        #[arg(short, long)]
        script: PathBuf,

        /// User input for the session
        #[arg(short, long, default_value = "Hello")]
        input: String,

        /// Model name used for pricing and the context window
        #[arg(short, long)]
        model: Option<String>,

        /// Write JSONL trace events to stderr
        #[arg(long)]
        trace: bool,

        /// Hard cap on loop iterations
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Show the context window resolved for a model
    Budget {
        /// Model name (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List model pricing
    Pricing,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default config file path
    Path,
    /// Load the configuration and report problems
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the answer
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Commands::Config {
        action: ConfigAction::Path,
    } = cli.command
    {
        commands::config_cmd::path();
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    match cli.command {
        Commands::Replay {
            script,
            input,
            model,
            trace,
            max_iterations,
        } => {
            let opts = commands::replay::ReplayOptions {
                script,
                input,
                model,
                trace,
                max_iterations,
            };
            commands::replay::run(config, opts).await?
        }
        Commands::Budget { model } => commands::budget::run(&config, model.as_deref())?,
        Commands::Pricing => commands::pricing::run(&config)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config)?,
            ConfigAction::Validate => commands::config_cmd::validate(&config)?,
            ConfigAction::Path => commands::config_cmd::path(),
        },
    }

    Ok(())
}
