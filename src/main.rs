mod decide;
mod env;
mod executor;
mod queue;
mod remote;
mod sandbox;
mod template;
mod tool;

use clap::{Parser, ValueEnum};
use decide::{LlmDecider, LlmDeciderConfig, ManifestDecider, StartDecider};
use executor::{ExecutionState, Executor, ExecutorConfig, Plan, Step};
use queue::{AdmissionQueue, QueueConfig};
use remote::{DeployTool, RemoteConfig, RemoteOrchestrator};
use sandbox::{SandboxConfig, SandboxRunner, TerminalTool};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tool::{Outcome, PlanContext, ToolRegistry};
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt;

/// Final plan report printed to stdout
#[derive(Serialize)]
struct Report<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a ExecutionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a Outcome>,
    steps: &'a [Step],
}

/// How the deploy tool infers a start command
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeciderKind {
    /// Rules over package.json and the file list
    Manifest,
    /// Ask the configured inference endpoint
    Llm,
}

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "planrun")]
#[command(about = "Execute a tool plan step by step")]
struct Args {
    /// Plan file: {"steps": [{"tool", "input", "as"}, ...]} or null
    plan: PathBuf,

    /// Value handed to tools through the plan context (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Actor the plan runs on behalf of
    #[arg(long, default_value = "cli")]
    actor: String,

    /// Start command inference for deployments
    #[arg(long, value_enum, default_value = "manifest")]
    decider: DeciderKind,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn log_level() -> Level {
    std::env::var("PLANRUN_LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(Level::DEBUG)
}

/// Build the registry of hard tools. Deploy is only offered when a remote host is configured.
fn build_registry(
    queue: Arc<AdmissionQueue>,
    descriptions: &HashMap<String, String>,
    decider_kind: DeciderKind,
) -> Result<ToolRegistry, Box<dyn std::error::Error>> {
    let mut registry = ToolRegistry::new();

    let sandbox_config = SandboxConfig::from_env();
    info!(
        runtime = %sandbox_config.runtime,
        image = %sandbox_config.image,
        timeout_ms = sandbox_config.timeout.as_millis() as u64,
        "sandbox configured"
    );
    let runner = Arc::new(SandboxRunner::docker(sandbox_config, queue));
    let terminal_desc = descriptions
        .get(sandbox::TERMINAL_TOOL)
        .cloned()
        .unwrap_or_else(sandbox::default_terminal_description);
    registry.register(Arc::new(TerminalTool::new(runner, terminal_desc)));

    match RemoteConfig::from_env() {
        Ok(remote_config) => {
            let decider: Arc<dyn StartDecider> = match decider_kind {
                DeciderKind::Manifest => Arc::new(ManifestDecider),
                DeciderKind::Llm => Arc::new(LlmDecider::new(LlmDeciderConfig::from_env()?)?),
            };
            info!(host = %remote_config.host, decider = ?decider_kind, "remote deploy configured");
            let orchestrator = Arc::new(RemoteOrchestrator::over_ssh(remote_config, decider));
            let deploy_desc = descriptions
                .get(remote::DEPLOY_TOOL)
                .cloned()
                .unwrap_or_else(remote::default_deploy_description);
            registry.register(Arc::new(DeployTool::new(orchestrator, deploy_desc)));
        }
        Err(e) => warn!(error = %e, "remote deploy disabled"),
    }

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_max_level(log_level())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let executor_config = ExecutorConfig::from_env();
    let queue_config = QueueConfig::from_env();
    info!(
        max_retries = executor_config.max_retries,
        tool_timeout_secs = executor_config.tool_timeout.as_secs(),
        max_concurrent = queue_config.max_concurrent,
        "Configuration loaded"
    );

    let descriptions = tool::load_tool_descriptions(&executor_config.tools_toml_path)?;
    let queue = AdmissionQueue::shared(queue_config);
    let registry = build_registry(queue.clone(), &descriptions, args.decider)?;
    let executor = Executor::new(registry, executor_config);
    info!(tools = ?executor.tool_descriptors().iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), "Executor initialized");

    let raw = tokio::fs::read_to_string(&args.plan).await?;
    let mut plan = Plan::from_json(&raw)?;
    if plan.is_empty() {
        info!(plan = %args.plan.display(), "plan has no steps, nothing to execute");
    }

    let context = PlanContext::new(args.actor.clone())
        .with_env(args.env.into_iter().collect::<BTreeMap<_, _>>());

    // The plan future is dropped when select! returns, which starts container
    // removal for any sandbox run still in flight before the exit below.
    let finished = tokio::select! {
        result = executor.execute_plan(&args.actor, &mut plan.steps, &context) => Some(result),
        _ = signal::ctrl_c() => None,
    };
    let Some(result) = finished else {
        warn!("Received shutdown signal, abandoning plan");
        queue.close();
        process::exit(130);
    };

    let (ok, state, error, detail) = match &result {
        Ok(state) => (true, Some(state), None, None),
        Err(e) => {
            error!(error = %e, "plan failed");
            (false, None, Some(e.to_string()), e.detail())
        }
    };
    let report = Report {
        ok,
        state,
        error,
        detail,
        steps: &plan.steps,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !ok {
        process::exit(1);
    }
    Ok(())
}
