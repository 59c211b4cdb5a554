use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use strand_engine::{EngineOptions, FailurePolicy, FlowEngine};
use strand_flow::Flow;
use strand_loader::{FlowProvider, FsFlowProvider, parse_flow};
use strand_qa::{AnswerQuestionsFunction, EchoAnswerer};
use strand_registry::{FunctionRegistry, register_builtins};

/// Strand - a configuration-driven flow interpreter
#[derive(Parser)]
#[command(name = "strand")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.strand)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a flow, reading parameter bindings as JSON from stdin
  Run {
    /// Path to a flow file, or the name of a flow in <data-dir>/flows
    flow: String,

    /// Record task failures and keep running instead of aborting
    #[arg(long)]
    tolerate_failures: bool,
  },

  /// Parse and validate a flow without running it
  Validate {
    /// Path to a flow file, or the name of a flow in <data-dir>/flows
    flow: String,
  },

  /// List the flows available in <data-dir>/flows
  List,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".strand")
  });

  match cli.command {
    Some(Commands::Run {
      flow,
      tolerate_failures,
    }) => {
      run_flow(flow, data_dir, tolerate_failures)?;
    }
    Some(Commands::Validate { flow }) => {
      let rt = tokio::runtime::Runtime::new()?;
      let flow = rt.block_on(load_flow(&flow, &data_dir))?;
      eprintln!(
        "Flow '{}' is valid ({} steps, {} tasks)",
        flow.flow_id,
        flow.steps.len(),
        flow.steps.iter().map(|s| s.tasks.len()).sum::<usize>()
      );
    }
    Some(Commands::List) => {
      let rt = tokio::runtime::Runtime::new()?;
      let provider = FsFlowProvider::new(data_dir.join("flows"));
      for name in rt.block_on(provider.available()) {
        println!("{name}");
      }
    }
    None => {
      println!("strand - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_flow(flow: String, data_dir: PathBuf, tolerate_failures: bool) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_flow_async(flow, data_dir, tolerate_failures).await })
}

async fn run_flow_async(flow: String, data_dir: PathBuf, tolerate_failures: bool) -> Result<()> {
  let flow = load_flow(&flow, &data_dir).await?;
  eprintln!("Loaded flow: {}", flow.flow_id);

  // Read parameter bindings from stdin
  let params = read_params_from_stdin()?;

  let registry = build_registry()?;
  let options = EngineOptions {
    failure_policy: if tolerate_failures {
      FailurePolicy::TolerateTaskFailures
    } else {
      FailurePolicy::FailFast
    },
  };
  let engine = FlowEngine::with_options(Arc::new(registry), options);

  let cancel = CancellationToken::new();
  let result = engine
    .execute(&flow, params, cancel)
    .await
    .context("flow execution failed")?;

  eprintln!("Execution completed: {}", result.execution_id);
  for failure in &result.failures {
    eprintln!(
      "Task failed (tolerated): {}.{}: {}",
      failure.step_id, failure.task_id, failure.error
    );
  }

  // Print exported results as JSON
  println!("{}", serde_json::to_string_pretty(&result.exports.to_json())?);

  Ok(())
}

/// Load a flow from a file path, or by name from `<data-dir>/flows`.
async fn load_flow(flow: &str, data_dir: &PathBuf) -> Result<Arc<Flow>> {
  let path = PathBuf::from(flow);
  if path.is_file() {
    let source = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read flow file: {}", path.display()))?;
    let flow = parse_flow(&source)
      .with_context(|| format!("failed to load flow file: {}", path.display()))?;
    return Ok(Arc::new(flow));
  }

  let provider = FsFlowProvider::new(data_dir.join("flows"));
  let flow = provider
    .load(flow)
    .await
    .with_context(|| format!("failed to load flow '{flow}'"))?;
  Ok(flow)
}

/// The functions available to flows run from the command line.
fn build_registry() -> Result<FunctionRegistry> {
  let mut registry = FunctionRegistry::new();
  register_builtins(&mut registry).context("failed to register builtin functions")?;
  registry
    .register(
      "answer_questions",
      Arc::new(AnswerQuestionsFunction::new(Arc::new(EchoAnswerer))),
    )
    .context("failed to register answer_questions")?;
  Ok(registry)
}

fn read_params_from_stdin() -> Result<serde_json::Map<String, serde_json::Value>> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty bindings
    return Ok(serde_json::Map::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read parameters from stdin")?;

  if input.trim().is_empty() {
    return Ok(serde_json::Map::new());
  }

  let value: serde_json::Value =
    serde_json::from_str(&input).context("failed to parse parameter JSON from stdin")?;
  match value {
    serde_json::Value::Object(map) => Ok(map),
    _ => anyhow::bail!("parameters must be a JSON object"),
  }
}
