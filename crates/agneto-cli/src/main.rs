//! `agneto <task-id> "<task text>" [--auto-merge] [--non-interactive]` (§6).

mod provider_http;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use coordination::{
    CommandBus, Dashboard, EventBus, MetricsCollector, OrchestratorOptions, Reporter, ShellGitBridge,
    TaskState,
};

use agneto_cli::orchestrator::{run_task, OrchestratorDeps, TaskContext};
use provider_http::HttpLlmProvider;

#[derive(Parser, Debug)]
#[command(name = "agneto", about = "Hierarchical plan/code/review task orchestrator")]
struct Cli {
    /// Stable identifier for this task; worktrees and checkpoints are
    /// namespaced under it.
    task_id: String,

    /// The task description, in the human's own words.
    task: String,

    /// Merge the task branch into the default branch on COMPLETE.
    #[arg(long)]
    auto_merge: bool,

    /// Skip the interactive Refiner interview and human approval gates,
    /// translating every `needs-human` verdict straight to ABANDONED.
    #[arg(long)]
    non_interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = OrchestratorOptions::new(cli.auto_merge, cli.non_interactive);

    tracing_subscriber::fmt()
        .with_env_filter(options.log_level.as_filter_directive())
        .init();

    let worktree_base = std::env::var("AGNETO_WORKTREE_BASE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().expect("current dir"));
    let git = ShellGitBridge::new(worktree_base);
    let working_directory = git
        .ensure_worktree(&cli.task_id)
        .await
        .with_context(|| format!("failed to create worktree for task {}", cli.task_id))?;

    let provider = HttpLlmProvider::from_env();
    let commands = CommandBus::new();
    let events = EventBus::default();
    let dashboard = Dashboard::from_endpoint(options.dashboard_endpoint.clone());
    let metrics = std::sync::Mutex::new(MetricsCollector::new());
    let reporter = Reporter::new(cli.task_id.clone());
    let checkpoint_dir = PathBuf::from(".agneto").join(format!("task-{}", cli.task_id)).join("checkpoints");

    let deps = OrchestratorDeps {
        provider: &provider,
        git: &git,
        commands: &commands,
        events: &events,
        dashboard: &dashboard,
        metrics: &metrics,
        reporter: &reporter,
        options: &options,
        checkpoint_dir,
    };

    let mut ctx = TaskContext::new(cli.task_id.clone(), cli.task.clone(), working_directory);

    let outcome = run_task(&deps, &mut ctx).await;

    match outcome {
        Ok(TaskState::Complete) => {
            println!("task {} COMPLETE", cli.task_id);
            Ok(())
        }
        Ok(TaskState::Abandoned) => {
            let reason = ctx.last_error.unwrap_or_else(|| "unspecified".to_string());
            eprintln!("task {} ABANDONED: {reason}", cli.task_id);
            std::process::exit(1);
        }
        Ok(other) => {
            eprintln!("task {} ended in unexpected non-terminal state {other}", cli.task_id);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("task {} failed: {e}", cli.task_id);
            std::process::exit(1);
        }
    }
}
