use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowrun_cli::settings::EngineSettings;
use flowrun_cli::{run_flow, validate_flow, validation_registry};
use flowrun_core::context::{RunMetadata, Trigger};
use flowrun_graph::loader::load_flow_file;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowrun", version, about = "Run flow documents")]
struct Cli {
    /// Engine settings file (YAML)
    #[arg(short, long, env = "FLOWRUN_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a flow and print the end node's output
    Run {
        /// Flow document (.json, .yaml or .yml)
        flow: PathBuf,
        /// Trigger the run with a chat message
        #[arg(short, long, conflicts_with = "args")]
        message: Option<String>,
        /// Trigger the run with a JSON object of arguments
        #[arg(long)]
        args: Option<String>,
        #[arg(long, default_value = "")]
        agent_id: String,
        #[arg(long, default_value = "")]
        user_id: String,
        #[arg(long, default_value = "")]
        topic_id: String,
        /// Also print every node's output
        #[arg(long)]
        verbose: bool,
    },
    /// Check a flow without running it
    Validate {
        flow: PathBuf,
    },
}

fn trigger(message: Option<String>, args: Option<String>) -> anyhow::Result<Trigger> {
    match (message, args) {
        (Some(text), _) => Ok(Trigger::message(text)),
        (None, Some(raw)) => {
            let payload: Map<String, Value> =
                serde_json::from_str(&raw).context("--args must be a JSON object")?;
            Ok(Trigger::arguments(payload))
        }
        (None, None) => Ok(Trigger::default()),
    }
}

async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let settings = match &cli.settings {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };

    match cli.command {
        Commands::Run {
            flow,
            message,
            args,
            agent_id,
            user_id,
            topic_id,
            verbose,
        } => {
            let mut flow = load_flow_file(&flow)?;
            let metadata = RunMetadata {
                agent_id,
                user_id,
                topic_id,
                trigger: trigger(message, args)?,
                ..RunMetadata::default()
            };
            let (report, ctx) = run_flow(&settings, &mut flow, metadata).await?;
            let out = if verbose {
                json!({"output": report.output, "steps": report.steps, "nodes": ctx.node_outputs})
            } else {
                Value::Object(report.output)
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(true)
        }
        Commands::Validate { flow: path } => {
            let flow = load_flow_file(&path)?;
            let registry = validation_registry();
            let issues = validate_flow(&registry, &flow);
            if issues.is_empty() {
                println!("{}: ok ({} nodes)", path.display(), flow.len());
                return Ok(true);
            }
            for issue in &issues {
                eprintln!("{issue}");
            }
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "flowrun=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
