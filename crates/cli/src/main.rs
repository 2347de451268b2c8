//! `rusty-orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    : load definitions and start the API server.
//! - `validate` : validate a workflow JSON file.
//! - `run`      : schedule one instance of a workflow and print its summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use engine::{
    validate_workflow, ContextualInputStore, Engine, EngineConfig, Operation, OperationKind, Workflow,
    WorkflowRegistry,
};
use transport::{ClientConfig, ReqwestClient};

#[derive(Parser)]
#[command(
    name = "rusty-orchestrator",
    about = "Event-driven workflow orchestration engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "ORCHESTRATOR_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        /// Directory of workflow JSON files registered at startup.
        #[arg(long, env = "ORCHESTRATOR_DEFINITIONS")]
        definitions: Option<PathBuf>,
        #[arg(long, env = "ORCHESTRATOR_HTTP_TIMEOUT_SECS", default_value_t = 30)]
        http_timeout_secs: u64,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Register a workflow, schedule one instance and wait for it to finish.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Global input, repeatable.
        #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,
        #[arg(long, default_value_t = 30)]
        wait_secs: u64,
        #[arg(long, env = "ORCHESTRATOR_HTTP_TIMEOUT_SECS", default_value_t = 30)]
        http_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info")?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            definitions,
            http_timeout_secs,
        } => {
            let (registry, inputs) = stores();
            if let Some(dir) = definitions {
                let workflows = load_definitions(&dir)?;
                info!("Registered {} workflow(s) from {}", workflows.len(), dir.display());
                registry.save_all(workflows);
            }

            let engine = start_engine(registry, inputs, http_timeout_secs)?;
            info!("Starting API server on {bind}");
            api::serve(&bind, engine).await.context("API server failed")?;
        }
        Command::Validate { path } => match load_workflow(&path) {
            Ok(workflow) => {
                println!(
                    "Workflow '{}' is valid ({} tasks, {} handlers)",
                    workflow.name,
                    workflow.tasks.len(),
                    workflow.handlers.len()
                );
            }
            Err(e) => {
                eprintln!("Validation failed: {e:#}");
                std::process::exit(1);
            }
        },
        Command::Run {
            path,
            inputs: globals,
            wait_secs,
            http_timeout_secs,
        } => {
            let workflow = load_workflow(&path)?;
            let name = workflow.name.clone();

            let (registry, inputs) = stores();
            registry.save(workflow);
            let engine = start_engine(registry, inputs, http_timeout_secs)?;
            let mut summaries = engine.subscribe();

            let mut operation = Operation::new(name.clone(), OperationKind::Schedule);
            for (key, value) in globals {
                operation = operation.input(key, value);
            }
            engine.submit(operation)?;

            let summary = tokio::time::timeout(Duration::from_secs(wait_secs), async {
                loop {
                    match summaries.recv().await {
                        Ok(summary) if summary.workflow_name == name => return Ok(summary),
                        Ok(_) | Err(RecvError::Lagged(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
            })
            .await
            .with_context(|| format!("instance of '{name}' did not finish within {wait_secs}s"))?
            .context("summary channel closed")?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.success {
                warn!("Instance {} ended as {}", summary.instance_name, summary.status);
            }
        }
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn stores() -> (Arc<WorkflowRegistry>, Arc<ContextualInputStore>) {
    let inputs = Arc::new(ContextualInputStore::new());
    (Arc::new(WorkflowRegistry::new(inputs.clone())), inputs)
}

fn start_engine(
    registry: Arc<WorkflowRegistry>,
    inputs: Arc<ContextualInputStore>,
    http_timeout_secs: u64,
) -> Result<Engine> {
    let config = ClientConfig::default().with_timeout(Duration::from_secs(http_timeout_secs));
    let client = ReqwestClient::new(config).context("failed to build HTTP client")?;
    Ok(Engine::start(EngineConfig::default(), registry, inputs, Arc::new(client)))
}

fn load_workflow(path: &Path) -> Result<Workflow> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read file {}", path.display()))?;
    let workflow: Workflow =
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))?;
    validate_workflow(&workflow).with_context(|| format!("invalid workflow in {}", path.display()))?;
    Ok(workflow)
}

/// Every `*.json` file in `dir`, in file name order.
fn load_definitions(dir: &Path) -> Result<Vec<Workflow>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(|p| load_workflow(p)).collect()
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
