//! Checkpoint & restoration (§4.8).
//!
//! Directly modeled on the teacher's `StateCheckpoint`/`ResumeResult`/
//! `save_checkpoint`/`load_checkpoint`/`is_checkpointable` in
//! `state_machine.rs`, generalized to carry both FSM snapshots plus the
//! session map and file-system snapshot the distilled spec requires,
//! instead of just the single outer state the teacher checkpoints.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::exec_fsm::{ExecState, ExecTransitionRecord, ExecutionContext, ExecutionStateMachine};
use crate::git_bridge::GitBridge;
use crate::session::{AgentRole, SessionHandle, SessionRegistry};
use crate::task_fsm::{TaskState, TaskStateMachine, TransitionRecord};
use crate::verdicts::SuperReviewerVerdict;

/// Bumped whenever the checkpoint schema changes incompatibly.
pub const CHECKPOINT_SCHEMA_VERSION: u8 = 1;
const SUPPORTED_SCHEMA_VERSIONS: &[u8] = &[1];

/// `TaskContext` minus transient UI projections (`liveActivity`,
/// `toolStatus`), per §4.8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContextSnapshot {
    pub task_id: String,
    pub human_task: String,
    pub refined_task: Option<String>,
    pub task_to_use: String,
    pub working_directory: PathBuf,
    pub baseline_commit: Option<String>,
    pub plan_markdown: Option<String>,
    pub plan_path: Option<PathBuf>,
    pub curmudgeon_feedback: Option<String>,
    pub simplification_count: u32,
    pub super_review_result: Option<SuperReviewerVerdict>,
    pub retry_feedback: Option<String>,
    pub pending_injection: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSnapshot {
    pub current_branch: String,
    pub baseline_commit: String,
    /// Task commits recorded in application order, used to replay via
    /// cherry-pick during restoration.
    pub task_commits: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCheckpoint {
    pub schema_version: u8,
    pub checkpoint_number: u32,
    pub trigger: String,
    pub created_at: String,
    pub outer_state: TaskState,
    pub outer_transitions: Vec<TransitionRecord>,
    pub exec_state: Option<ExecState>,
    pub exec_transitions: Vec<ExecTransitionRecord>,
    pub execution_context: Option<ExecutionContext>,
    pub sessions: Vec<(AgentRole, SessionHandle)>,
    pub task_context: TaskContextSnapshot,
    pub git: GitSnapshot,
}

impl TaskCheckpoint {
    pub fn new(
        checkpoint_number: u32,
        trigger: impl Into<String>,
        task_fsm: &TaskStateMachine,
        exec_fsm: Option<&ExecutionStateMachine>,
        execution_context: Option<ExecutionContext>,
        sessions: &SessionRegistry,
        task_context: TaskContextSnapshot,
        git: GitSnapshot,
    ) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            checkpoint_number,
            trigger: trigger.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            outer_state: task_fsm.current(),
            outer_transitions: task_fsm.transitions().to_vec(),
            exec_state: exec_fsm.map(|f| f.current()),
            exec_transitions: exec_fsm.map(|f| f.transitions().to_vec()).unwrap_or_default(),
            execution_context,
            sessions: sessions.snapshot(),
            task_context,
            git,
        }
    }
}

/// Whether the outer FSM is in a state worth checkpointing. Excludes
/// INIT (nothing happened yet) and the two terminal states (nothing
/// left to resume).
pub fn is_checkpointable(state: TaskState) -> bool {
    !matches!(state, TaskState::Init | TaskState::Complete | TaskState::Abandoned)
}

#[derive(Debug)]
pub enum ResumeResult {
    Restored {
        task_fsm: TaskStateMachine,
        exec_fsm: Option<ExecutionStateMachine>,
        execution_context: Option<ExecutionContext>,
        sessions: SessionRegistry,
        task_context: TaskContextSnapshot,
    },
    IncompatibleSchema {
        found: u8,
        expected: &'static [u8],
    },
    TaskIdMismatch {
        found: String,
        expected: String,
    },
    BaselineCommitMissing {
        commit: String,
    },
}

/// Restoration procedure from §4.8:
/// 1. validate schema version
/// 2. verify task id
/// 3. verify baseline commit exists
/// 4. reset to baseline, cherry-pick recorded commits in order
/// 5. rehydrate both FSMs
pub async fn restore_from_checkpoint(
    checkpoint: TaskCheckpoint,
    expected_task_id: &str,
    git: &dyn GitBridge,
) -> OrchestratorResult<ResumeResult> {
    if !SUPPORTED_SCHEMA_VERSIONS.contains(&checkpoint.schema_version) {
        return Ok(ResumeResult::IncompatibleSchema {
            found: checkpoint.schema_version,
            expected: SUPPORTED_SCHEMA_VERSIONS,
        });
    }

    if checkpoint.task_context.task_id != expected_task_id {
        return Ok(ResumeResult::TaskIdMismatch {
            found: checkpoint.task_context.task_id.clone(),
            expected: expected_task_id.to_string(),
        });
    }

    let cwd = &checkpoint.task_context.working_directory;
    let baseline = &checkpoint.git.baseline_commit;
    if !git.commit_exists(cwd, baseline).await.map_err(|e| OrchestratorError::GitFailure(e.to_string()))? {
        return Ok(ResumeResult::BaselineCommitMissing {
            commit: baseline.clone(),
        });
    }

    if git
        .has_uncommitted_changes(cwd)
        .await
        .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?
    {
        git.stash_with_marker(cwd, &format!("agneto-restore-{}", checkpoint.task_context.task_id))
            .await
            .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;
    }

    git.reset_to(cwd, baseline)
        .await
        .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;

    for commit in &checkpoint.git.task_commits {
        git.cherry_pick(cwd, commit).await.map_err(|e| match e {
            crate::git_bridge::GitBridgeError::CherryPickConflict { commit, stderr } => {
                OrchestratorError::CherryPickConflict { commit, reason: stderr }
            }
            other => OrchestratorError::GitFailure(other.to_string()),
        })?;
    }

    let task_fsm = TaskStateMachine::restore(checkpoint.outer_state, checkpoint.outer_transitions);
    let exec_fsm = checkpoint
        .exec_state
        .map(|state| ExecutionStateMachine::restore(state, checkpoint.exec_transitions));
    let sessions = SessionRegistry::restore(checkpoint.sessions);

    Ok(ResumeResult::Restored {
        task_fsm,
        exec_fsm,
        execution_context: checkpoint.execution_context,
        sessions,
        task_context: checkpoint.task_context,
    })
}

/// Writes `checkpoint-NNN.json` into `dir` and refreshes a `metadata.json`
/// index listing all checkpoint files in order, matching the append-only
/// checkpoint directory policy of §5.
pub fn save_checkpoint(dir: &Path, checkpoint: &TaskCheckpoint) -> OrchestratorResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("checkpoint-{:03}.json", checkpoint.checkpoint_number);
    let path = dir.join(&filename);
    let json = serde_json::to_string_pretty(checkpoint)?;
    std::fs::write(&path, json)?;

    let metadata_path = dir.join("metadata.json");
    let mut entries: Vec<String> = if metadata_path.exists() {
        serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?
    } else {
        Vec::new()
    };
    if !entries.contains(&filename) {
        entries.push(filename);
    }
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&entries)?)?;

    tracing::info!(path = %path.display(), "checkpoint written");
    Ok(path)
}

pub fn load_checkpoint(path: &Path) -> OrchestratorResult<TaskCheckpoint> {
    let content = std::fs::read_to_string(path)?;
    let checkpoint = serde_json::from_str(&content)?;
    Ok(checkpoint)
}

/// Loads the most recent checkpoint listed in `dir/metadata.json`, if any.
pub fn load_latest_checkpoint(dir: &Path) -> OrchestratorResult<Option<TaskCheckpoint>> {
    let metadata_path = dir.join("metadata.json");
    if !metadata_path.exists() {
        return Ok(None);
    }
    let entries: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?;
    match entries.last() {
        Some(filename) => Ok(Some(load_checkpoint(&dir.join(filename))?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec_fsm::ExecEvent;
    use crate::task_fsm::TaskEvent;

    fn sample_task_context(task_id: &str) -> TaskContextSnapshot {
        TaskContextSnapshot {
            task_id: task_id.to_string(),
            human_task: "write hello.txt".to_string(),
            refined_task: None,
            task_to_use: "write hello.txt".to_string(),
            working_directory: PathBuf::from("/tmp/agneto-task"),
            baseline_commit: Some("deadbeef".to_string()),
            plan_markdown: Some("# Plan\n1. write file".to_string()),
            plan_path: Some(PathBuf::from(".plans/t1/plan.md")),
            curmudgeon_feedback: None,
            simplification_count: 1,
            super_review_result: None,
            retry_feedback: None,
            pending_injection: None,
            last_error: None,
        }
    }

    #[test]
    fn checkpointable_excludes_init_and_terminal_states() {
        assert!(!is_checkpointable(TaskState::Init));
        assert!(!is_checkpointable(TaskState::Complete));
        assert!(!is_checkpointable(TaskState::Abandoned));
        assert!(is_checkpointable(TaskState::Curmudgeoning));
        assert!(is_checkpointable(TaskState::Executing));
    }

    #[test]
    fn save_and_load_checkpoint_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut task_fsm = TaskStateMachine::new();
        task_fsm.advance(TaskEvent::StartTask { interactive: false }, "start").unwrap();
        task_fsm.advance(TaskEvent::PlanCreated, "plan ready").unwrap();

        let sessions = SessionRegistry::new();
        let checkpoint = TaskCheckpoint::new(
            1,
            "PLAN_CREATED",
            &task_fsm,
            None,
            None,
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "agneto/task-t1".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );

        let path = save_checkpoint(dir.path(), &checkpoint).unwrap();
        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded.outer_state, TaskState::Curmudgeoning);
        assert_eq!(loaded.task_context.task_id, "t1");
        assert_eq!(loaded.outer_transitions.len(), 2);
    }

    #[test]
    fn load_latest_checkpoint_returns_newest() {
        let dir = tempfile::tempdir().unwrap();
        let task_fsm = TaskStateMachine::new();
        let sessions = SessionRegistry::new();
        let git = GitSnapshot {
            current_branch: "agneto/task-t1".to_string(),
            baseline_commit: "deadbeef".to_string(),
            task_commits: vec![],
        };

        for n in 1..=3 {
            let checkpoint = TaskCheckpoint::new(
                n,
                "tick",
                &task_fsm,
                None,
                None,
                &sessions,
                sample_task_context("t1"),
                git.clone(),
            );
            save_checkpoint(dir.path(), &checkpoint).unwrap();
        }

        let latest = load_latest_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(latest.checkpoint_number, 3);
    }

    #[test]
    fn load_nonexistent_checkpoint_errors() {
        let result = load_checkpoint(Path::new("/nonexistent/checkpoint-001.json"));
        assert!(result.is_err());
    }

    struct MockGit {
        baseline_exists: bool,
        uncommitted: bool,
    }

    #[async_trait::async_trait]
    impl GitBridge for MockGit {
        async fn ensure_worktree(&self, _task_id: &str) -> Result<PathBuf, crate::git_bridge::GitBridgeError> {
            Ok(PathBuf::from("/tmp/wt"))
        }
        async fn apply_patch(&self, _cwd: &Path, _patch: &str) -> Result<(), crate::git_bridge::GitBridgeError> {
            Ok(())
        }
        async fn commit(&self, _cwd: &Path, _message: &str) -> Result<String, crate::git_bridge::GitBridgeError> {
            Ok("newcommit".to_string())
        }
        async fn current_commit(&self, _cwd: &Path) -> Result<String, crate::git_bridge::GitBridgeError> {
            Ok("deadbeef".to_string())
        }
        async fn reset_to(&self, _cwd: &Path, _commit: &str) -> Result<(), crate::git_bridge::GitBridgeError> {
            Ok(())
        }
        async fn cherry_pick(&self, _cwd: &Path, _commit: &str) -> Result<(), crate::git_bridge::GitBridgeError> {
            Ok(())
        }
        async fn has_uncommitted_changes(&self, _cwd: &Path) -> Result<bool, crate::git_bridge::GitBridgeError> {
            Ok(self.uncommitted)
        }
        async fn stash_with_marker(&self, _cwd: &Path, _marker: &str) -> Result<(), crate::git_bridge::GitBridgeError> {
            Ok(())
        }
        async fn merge_to_default_branch(&self, _cwd: &Path) -> Result<(), crate::git_bridge::GitBridgeError> {
            Ok(())
        }
        async fn commit_exists(&self, _cwd: &Path, _commit: &str) -> Result<bool, crate::git_bridge::GitBridgeError> {
            Ok(self.baseline_exists)
        }
    }

    #[tokio::test]
    async fn resume_rejects_incompatible_schema() {
        let mut checkpoint_task_fsm = TaskStateMachine::new();
        checkpoint_task_fsm.advance(TaskEvent::StartTask { interactive: false }, "start").unwrap();
        let sessions = SessionRegistry::new();
        let mut checkpoint = TaskCheckpoint::new(
            1,
            "tick",
            &checkpoint_task_fsm,
            None,
            None,
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "b".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );
        checkpoint.schema_version = 99;

        let git = MockGit {
            baseline_exists: true,
            uncommitted: false,
        };
        let result = restore_from_checkpoint(checkpoint, "t1", &git).await.unwrap();
        assert!(matches!(result, ResumeResult::IncompatibleSchema { found: 99, .. }));
    }

    #[tokio::test]
    async fn resume_rejects_task_id_mismatch() {
        let task_fsm = TaskStateMachine::new();
        let sessions = SessionRegistry::new();
        let checkpoint = TaskCheckpoint::new(
            1,
            "tick",
            &task_fsm,
            None,
            None,
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "b".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );
        let git = MockGit {
            baseline_exists: true,
            uncommitted: false,
        };
        let result = restore_from_checkpoint(checkpoint, "t2", &git).await.unwrap();
        assert!(matches!(result, ResumeResult::TaskIdMismatch { .. }));
    }

    #[tokio::test]
    async fn resume_rejects_missing_baseline_commit() {
        let task_fsm = TaskStateMachine::new();
        let sessions = SessionRegistry::new();
        let checkpoint = TaskCheckpoint::new(
            1,
            "tick",
            &task_fsm,
            None,
            None,
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "b".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );
        let git = MockGit {
            baseline_exists: false,
            uncommitted: false,
        };
        let result = restore_from_checkpoint(checkpoint, "t1", &git).await.unwrap();
        assert!(matches!(result, ResumeResult::BaselineCommitMissing { .. }));
    }

    #[tokio::test]
    async fn resume_restores_outer_state_s5() {
        let mut task_fsm = TaskStateMachine::new();
        task_fsm.advance(TaskEvent::StartTask { interactive: false }, "start").unwrap();
        task_fsm.advance(TaskEvent::PlanCreated, "plan ready").unwrap();
        let sessions = SessionRegistry::new();
        let checkpoint = TaskCheckpoint::new(
            1,
            "PLAN_CREATED",
            &task_fsm,
            None,
            None,
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "b".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );
        let git = MockGit {
            baseline_exists: true,
            uncommitted: false,
        };
        let result = restore_from_checkpoint(checkpoint, "t1", &git).await.unwrap();
        match result {
            ResumeResult::Restored { task_fsm, .. } => {
                assert_eq!(task_fsm.current(), TaskState::Curmudgeoning);
            }
            other => panic!("expected Restored, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resume_continues_exec_transitions() {
        let mut task_fsm = TaskStateMachine::new();
        task_fsm.advance(TaskEvent::StartTask { interactive: false }, "start").unwrap();
        task_fsm.advance(TaskEvent::PlanCreated, "plan ready").unwrap();
        task_fsm.advance(TaskEvent::CurmudgeonApproved, "approved").unwrap();

        let mut exec_fsm = ExecutionStateMachine::new();
        exec_fsm.advance(ExecEvent::StartChunking).unwrap();
        exec_fsm.advance(ExecEvent::WorkChunkEmitted).unwrap();

        let sessions = SessionRegistry::new();
        let checkpoint = TaskCheckpoint::new(
            1,
            "chunk started",
            &task_fsm,
            Some(&exec_fsm),
            Some(ExecutionContext::default()),
            &sessions,
            sample_task_context("t1"),
            GitSnapshot {
                current_branch: "b".to_string(),
                baseline_commit: "deadbeef".to_string(),
                task_commits: vec![],
            },
        );
        let git = MockGit {
            baseline_exists: true,
            uncommitted: false,
        };
        let result = restore_from_checkpoint(checkpoint, "t1", &git).await.unwrap();
        match result {
            ResumeResult::Restored { exec_fsm: Some(fsm), .. } => {
                assert_eq!(fsm.current(), ExecState::Planning);
                assert_eq!(fsm.transitions().len(), 2);
            }
            other => panic!("expected restored exec fsm, got {other:?}"),
        }
    }
}
