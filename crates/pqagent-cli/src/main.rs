//! PQAgent CLI
//!
//! The `pqagent` command runs one sandboxed agent task against a workspace.
//!
//! ## Commands
//!
//! - `run`: Answer a prompt inside a workspace, one tool call per round
//! - `tools`: Print the normalized tool declarations
//! - `toc`: Print the table of contents of a PHREEQC result file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

use pqagent_core::tools::build_toc;
use pqagent_core::{
    standard_registry, Agent, AgentConfig, AgentSettings, OpenAiClient, RunContext, RunRequest,
    SandboxRoot,
};

#[derive(Parser, Debug)]
#[command(name = "pqagent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sandboxed single-tool agent for PHREEQC workspaces", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "PQAGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one task and print the final answer
    Run {
        /// Workspace directory every tool is confined to
        #[arg(short, long)]
        workspace: PathBuf,

        /// Task prompt
        #[arg(short, long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
        prompt: Option<String>,

        /// Read the task prompt from a file
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Maximum number of rounds (default from config)
        #[arg(long)]
        max_steps: Option<usize>,

        /// Model identifier (overrides config and OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Audit log path (default: <workspace>/logs/chat_*.jsonl)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Write the full conversation as JSON to this file
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Print the tool declarations sent to the model
    Tools,

    /// Print the table of contents of a result file
    Toc {
        /// Result file, e.g. result.out
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    pqagent_core::telemetry::init_tracing(cli.json, level);

    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            workspace,
            prompt,
            prompt_file,
            max_steps,
            model,
            log,
            transcript,
        } => {
            let prompt = read_prompt(prompt, prompt_file.as_deref())?;
            cmd_run(
                config,
                &workspace,
                prompt,
                max_steps,
                model,
                log,
                transcript.as_deref(),
            )
            .await
        }
        Commands::Tools => cmd_tools(&config),
        Commands::Toc { file } => cmd_toc(&file).await,
    }
}

fn read_prompt(prompt: Option<String>, prompt_file: Option<&Path>) -> Result<String> {
    let text = match (prompt, prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        (None, None) => bail!("either --prompt or --prompt-file is required"),
    };
    if text.trim().is_empty() {
        bail!("prompt is empty");
    }
    Ok(text)
}

async fn cmd_run(
    mut config: AgentConfig,
    workspace: &Path,
    prompt: String,
    max_steps: Option<usize>,
    model: Option<String>,
    log: Option<PathBuf>,
    transcript: Option<&Path>,
) -> Result<()> {
    if let Some(model) = model {
        config.model.name = model;
    }
    let max_steps = max_steps.unwrap_or(config.agent.max_steps);

    let api_key = config.api_key()?;
    let client = OpenAiClient::new(
        &config.model.base_url,
        &api_key,
        Duration::from_secs(config.model.request_timeout_secs),
    )
    .context("Failed to build model client")?;

    let registry = standard_registry(&config).context("Failed to register tools")?;
    let settings = AgentSettings::from_config(&config)?;
    let agent = Agent::new(Arc::new(client), registry, settings);

    let root = SandboxRoot::new(workspace)
        .with_context(|| format!("Invalid workspace {}", workspace.display()))?;
    let ctx = RunContext::new(root)?;
    info!(run_id = %ctx.run_id(), workspace = %ctx.sandbox().path().display(), "starting run");

    let mut request = RunRequest::prompt(prompt, max_steps);
    if let Some(log) = log {
        request = request.with_log_path(log);
    }

    let outcome = agent.run(ctx, request).await.context("Run failed")?;
    info!(
        status = outcome.status.as_str(),
        steps = outcome.steps,
        log = %outcome.log_path.display(),
        "run finished"
    );

    if let Some(path) = transcript {
        let json = serde_json::to_string_pretty(&outcome.messages)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write transcript {}", path.display()))?;
    }

    println!("{}", outcome.answer);
    Ok(())
}

fn cmd_tools(config: &AgentConfig) -> Result<()> {
    let registry = standard_registry(config).context("Failed to register tools")?;
    println!("{}", serde_json::to_string_pretty(&registry.declarations())?);
    Ok(())
}

async fn cmd_toc(file: &Path) -> Result<()> {
    let toc = build_toc(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&toc)?);
    Ok(())
}
