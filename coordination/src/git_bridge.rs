//! Git/worktree helper abstraction (§6).
//!
//! `GitBridge` is the narrow trait the orchestrator consumes; `ShellGitBridge`
//! shells out via `std::process::Command`, directly modeled on the teacher's
//! `harness/git_manager.rs` `GitManager` (`run_git`, retry-with-backoff on
//! transient failures, `current_commit`, `has_uncommitted_changes`).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitBridgeError {
    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
    #[error("cherry-pick of {commit} conflicted: {stderr}")]
    CherryPickConflict { commit: String, stderr: String },
    #[error("io error running git: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait GitBridge: Send + Sync {
    async fn ensure_worktree(&self, task_id: &str) -> Result<PathBuf, GitBridgeError>;
    async fn apply_patch(&self, cwd: &Path, patch: &str) -> Result<(), GitBridgeError>;
    async fn commit(&self, cwd: &Path, message: &str) -> Result<String, GitBridgeError>;
    async fn current_commit(&self, cwd: &Path) -> Result<String, GitBridgeError>;
    async fn reset_to(&self, cwd: &Path, commit: &str) -> Result<(), GitBridgeError>;
    async fn cherry_pick(&self, cwd: &Path, commit: &str) -> Result<(), GitBridgeError>;
    async fn has_uncommitted_changes(&self, cwd: &Path) -> Result<bool, GitBridgeError>;
    async fn stash_with_marker(&self, cwd: &Path, marker: &str) -> Result<(), GitBridgeError>;
    async fn merge_to_default_branch(&self, cwd: &Path) -> Result<(), GitBridgeError>;
    async fn commit_exists(&self, cwd: &Path, commit: &str) -> Result<bool, GitBridgeError>;
}

/// Shells out to the real `git` binary. Blocking `std::process::Command`
/// calls are wrapped in `spawn_blocking` so they don't stall the async
/// runtime, matching the suspension-point model of §5.
pub struct ShellGitBridge {
    worktree_base: PathBuf,
    max_retries: u32,
}

impl ShellGitBridge {
    pub fn new(worktree_base: impl Into<PathBuf>) -> Self {
        Self {
            worktree_base: worktree_base.into(),
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn run_git_sync(cwd: &Path, args: &[&str]) -> Result<String, GitBridgeError> {
        let output = Command::new("git").arg("-C").arg(cwd).args(args).output()?;
        if !output.status.success() {
            return Err(GitBridgeError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_git(&self, cwd: &Path, args: Vec<String>) -> Result<String, GitBridgeError> {
        let cwd = cwd.to_path_buf();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let cwd = cwd.clone();
            let args = args.clone();
            let result = tokio::task::spawn_blocking(move || {
                let refs: Vec<&str> = args.iter().map(String::as_str).collect();
                Self::run_git_sync(&cwd, &refs)
            })
            .await
            .expect("git blocking task panicked");

            match result {
                Ok(out) => return Ok(out),
                Err(e) if attempt < self.max_retries => {
                    tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
                    tracing::warn!(attempt, error = %e, "retrying git command");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl GitBridge for ShellGitBridge {
    async fn ensure_worktree(&self, task_id: &str) -> Result<PathBuf, GitBridgeError> {
        let path = self.worktree_base.join(format!("task-{task_id}"));
        if !path.exists() {
            self.run_git(
                &self.worktree_base,
                vec![
                    "worktree".into(),
                    "add".into(),
                    path.display().to_string(),
                    "-b".into(),
                    format!("agneto/task-{task_id}"),
                ],
            )
            .await?;
        }
        Ok(path)
    }

    async fn apply_patch(&self, cwd: &Path, patch: &str) -> Result<(), GitBridgeError> {
        let patch_path = cwd.join(".agneto-patch.diff");
        tokio::fs::write(&patch_path, patch).await?;
        self.run_git(cwd, vec!["apply".into(), patch_path.display().to_string()])
            .await?;
        tokio::fs::remove_file(&patch_path).await.ok();
        Ok(())
    }

    async fn commit(&self, cwd: &Path, message: &str) -> Result<String, GitBridgeError> {
        self.run_git(cwd, vec!["add".into(), "-A".into()]).await?;
        self.run_git(cwd, vec!["commit".into(), "-m".into(), message.to_string()])
            .await?;
        self.current_commit(cwd).await
    }

    async fn current_commit(&self, cwd: &Path) -> Result<String, GitBridgeError> {
        self.run_git(cwd, vec!["rev-parse".into(), "HEAD".into()]).await
    }

    async fn reset_to(&self, cwd: &Path, commit: &str) -> Result<(), GitBridgeError> {
        self.run_git(cwd, vec!["reset".into(), "--hard".into(), commit.to_string()])
            .await?;
        Ok(())
    }

    async fn cherry_pick(&self, cwd: &Path, commit: &str) -> Result<(), GitBridgeError> {
        let result = self.run_git(cwd, vec!["cherry-pick".into(), commit.to_string()]).await;
        if let Err(GitBridgeError::CommandFailed { stderr, .. }) = &result {
            self.run_git(cwd, vec!["cherry-pick".into(), "--abort".into()]).await.ok();
            return Err(GitBridgeError::CherryPickConflict {
                commit: commit.to_string(),
                stderr: stderr.clone(),
            });
        }
        result.map(|_| ())
    }

    async fn has_uncommitted_changes(&self, cwd: &Path) -> Result<bool, GitBridgeError> {
        let status = self.run_git(cwd, vec!["status".into(), "--porcelain".into()]).await?;
        Ok(!status.is_empty())
    }

    async fn stash_with_marker(&self, cwd: &Path, marker: &str) -> Result<(), GitBridgeError> {
        self.run_git(
            cwd,
            vec!["stash".into(), "push".into(), "-u".into(), "-m".into(), marker.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn merge_to_default_branch(&self, cwd: &Path) -> Result<(), GitBridgeError> {
        let branch = self.run_git(cwd, vec!["branch".into(), "--show-current".into()]).await?;
        self.run_git(cwd, vec!["checkout".into(), "main".into()]).await?;
        self.run_git(cwd, vec!["merge".into(), "--no-ff".into(), branch]).await?;
        Ok(())
    }

    async fn commit_exists(&self, cwd: &Path, commit: &str) -> Result<bool, GitBridgeError> {
        let result = self
            .run_git(cwd, vec!["cat-file".into(), "-e".into(), commit.to_string()])
            .await;
        Ok(result.is_ok())
    }
}
