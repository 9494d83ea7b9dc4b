//! forge-worker: run one agent session against one repository
//!
//! The task contract arrives through the environment (REPO_URL, TASK,
//! SESSION_ID, USER_ID, AUTOMATION_MODE, WORKSPACE_ROOT, GITHUB_TOKEN,
//! SERVICE_MODE); flags cover worker-local concerns only.

mod clone;
mod gateway;
mod reasoner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use forge_core::{AutomationMode, TaskConfig};
use forge_orchestrator::{Orchestrator, RunOutcome};
use forge_sandbox::Sandbox;
use forge_session::create_stores;
use forge_tools::{Dispatcher, ToolEnv};

use crate::gateway::ConsoleGateway;
use crate::reasoner::HttpReasoner;

#[derive(Parser)]
#[command(name = "forge-worker")]
#[command(author, version, about = "Autonomous software-engineering agent worker")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Reasoning service endpoint (falls back to REASONER_URL)
    #[arg(long)]
    reasoner_url: Option<String>,

    /// Directory for file-mode session state
    #[arg(long, default_value = "/var/lib/forge")]
    state_dir: PathBuf,

    /// Reuse the workspace as-is instead of cloning
    #[arg(long)]
    skip_clone: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = TaskConfig::from_env().context("Invalid task environment")?;
    tracing::info!(
        session_id = %config.session_id,
        repo = %config.repo_url,
        mode = %config.automation_mode,
        "Worker starting"
    );

    if !cli.skip_clone {
        clone::prepare_workspace(&config).await?;
    }

    let reasoner_url = cli
        .reasoner_url
        .or_else(|| std::env::var("REASONER_URL").ok())
        .context("A reasoner endpoint is required (--reasoner-url or REASONER_URL)")?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling in-flight work");
            ctrl_c_cancel.cancel();
        }
    });

    let sandbox = Sandbox::new(&config.workspace_root)
        .context("Workspace root is not usable as a sandbox")?;
    let stores = create_stores(config.service_mode, &cli.state_dir);
    let env = ToolEnv::new(sandbox, stores.memory.clone(), &config.user_id).with_cancel(cancel);

    let orchestrator = Orchestrator::new(
        Dispatcher::new(env),
        stores,
        Arc::new(HttpReasoner::new(reasoner_url)),
        Arc::new(ConsoleGateway::new(config.automation_mode)),
    );

    match orchestrator.run(&config).await? {
        RunOutcome::Done {
            summary,
            commit_message,
        } => {
            if let Some(message) = &commit_message {
                if config.automation_mode == AutomationMode::AutoCreatePr {
                    create_pull_request(&config.workspace_root, message).await?;
                }
            }
            tracing::info!(summary = %summary, "Session complete");
            println!("{}", summary);
            Ok(())
        }
        RunOutcome::Failed { reason } => {
            bail!("Session failed: {}", reason);
        }
    }
}

/// Push the branch and open a pull request (AUTO_CREATE_PR only)
async fn create_pull_request(workspace: &Path, title: &str) -> Result<()> {
    for args in [
        vec!["push", "--set-upstream", "origin", "HEAD"],
        vec!["pr", "create", "--title", title, "--body", ""],
    ] {
        let program = if args[0] == "push" { "git" } else { "gh" };
        let status = tokio::process::Command::new(program)
            .args(&args)
            .current_dir(workspace)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", program))?;
        if !status.success() {
            bail!("{} {} failed with {}", program, args.join(" "), status);
        }
    }
    tracing::info!("Pull request created");
    Ok(())
}
