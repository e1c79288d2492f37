//! The orchestrator loop: dispatches the outer task FSM through
//! REFINING/PLANNING/CURMUDGEONING/EXECUTING/SUPER_REVIEWING/GARDENING,
//! running the inner BEAN_COUNTING/PLANNING/PLAN_REVIEW/IMPLEMENTING/
//! CODE_REVIEW cycle once EXECUTING is entered.
//!
//! Procedural and flat, in the style of the teacher's `main.rs` retry
//! loop rather than a trait hierarchy (§9 REDESIGN FLAGS) — one function
//! per outer phase, called in sequence from `run_task`.

use std::path::PathBuf;

use coordination::{
    is_checkpointable, save_checkpoint, BeanCounterOutput, Chunk, CodeVerdict, Command, CommandBus,
    CommandType, CurmudgeonVerdict, Dashboard, DomainEvent, EventBus, ExecEvent, ExecState,
    ExecutionContext, ExecutionStateMachine, GitBridge, GitSnapshot, LlmProvider, MetricsCollector,
    OrchestratorError, OrchestratorOptions, OrchestratorResult, PlanVerdict, Reporter,
    SessionRegistry, SuperReviewerOutcome, TaskCheckpoint, TaskContextSnapshot, TaskEvent, TaskState,
    TaskStateMachine,
};

use crate::agents;
use crate::prompts::describe_bean_counter_completion;

/// Mutable, in-memory mirror of `TaskContextSnapshot`, owned by the
/// orchestrator for the life of one task run.
pub struct TaskContext {
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
    pub super_review_result: Option<coordination::SuperReviewerVerdict>,
    pub retry_feedback: Option<String>,
    pub pending_injection: Option<String>,
    pub last_error: Option<String>,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>, human_task: impl Into<String>, working_directory: PathBuf) -> Self {
        let human_task = human_task.into();
        Self {
            task_id: task_id.into(),
            task_to_use: human_task.clone(),
            human_task,
            refined_task: None,
            working_directory,
            baseline_commit: None,
            plan_markdown: None,
            plan_path: None,
            curmudgeon_feedback: None,
            simplification_count: 0,
            super_review_result: None,
            retry_feedback: None,
            pending_injection: None,
            last_error: None,
        }
    }

    fn to_snapshot(&self) -> TaskContextSnapshot {
        TaskContextSnapshot {
            task_id: self.task_id.clone(),
            human_task: self.human_task.clone(),
            refined_task: self.refined_task.clone(),
            task_to_use: self.task_to_use.clone(),
            working_directory: self.working_directory.clone(),
            baseline_commit: self.baseline_commit.clone(),
            plan_markdown: self.plan_markdown.clone(),
            plan_path: self.plan_path.clone(),
            curmudgeon_feedback: self.curmudgeon_feedback.clone(),
            simplification_count: self.simplification_count,
            super_review_result: self.super_review_result.clone(),
            retry_feedback: self.retry_feedback.clone(),
            pending_injection: self.pending_injection.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Consumes and clears any prompt injected between agent calls
    /// (§4.7). Returns `None` when nothing is pending.
    fn take_injection(&mut self) -> Option<String> {
        self.pending_injection.take()
    }
}

/// Everything the orchestrator needs that isn't task-specific state.
pub struct OrchestratorDeps<'a> {
    pub provider: &'a dyn LlmProvider,
    pub git: &'a dyn GitBridge,
    pub commands: &'a CommandBus,
    pub events: &'a EventBus,
    pub dashboard: &'a Dashboard,
    pub metrics: &'a std::sync::Mutex<MetricsCollector>,
    pub reporter: &'a Reporter,
    pub options: &'a OrchestratorOptions,
    pub checkpoint_dir: PathBuf,
}

fn publish(deps: &OrchestratorDeps, event: DomainEvent) {
    deps.dashboard.forward(&event);
    let _ = deps.events.publish(event);
}

/// Writes a checkpoint if `state` is worth resuming from (§4.8), folding
/// failures into a logged warning rather than aborting the task — a
/// missed checkpoint is recoverable, losing task progress to a checkpoint
/// bug is not.
#[allow(clippy::too_many_arguments)]
fn maybe_checkpoint(
    deps: &OrchestratorDeps,
    number: u32,
    trigger: &str,
    task_fsm: &TaskStateMachine,
    exec_fsm: Option<&ExecutionStateMachine>,
    exec_ctx: Option<ExecutionContext>,
    sessions: &SessionRegistry,
    ctx: &TaskContext,
    git_snapshot: GitSnapshot,
) {
    if !is_checkpointable(task_fsm.current()) {
        return;
    }
    let checkpoint = TaskCheckpoint::new(
        number,
        trigger,
        task_fsm,
        exec_fsm,
        exec_ctx,
        sessions,
        ctx.to_snapshot(),
        git_snapshot,
    );
    if let Err(e) = save_checkpoint(&deps.checkpoint_dir, &checkpoint) {
        deps.reporter.error(coordination::AgentRole::Refiner, &format!("checkpoint write failed: {e}"));
    }
}

async fn git_snapshot_for(deps: &OrchestratorDeps<'_>, ctx: &TaskContext) -> OrchestratorResult<GitSnapshot> {
    let baseline = ctx.baseline_commit.clone().unwrap_or_default();
    let current = deps
        .git
        .current_commit(&ctx.working_directory)
        .await
        .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;
    Ok(GitSnapshot {
        current_branch: format!("agneto/task-{}", ctx.task_id),
        baseline_commit: baseline,
        task_commits: if current.is_empty() { vec![] } else { vec![current] },
    })
}

/// Runs the REFINING phase if interactive, otherwise leaves
/// `task_to_use == human_task` untouched.
async fn run_refining(
    deps: &OrchestratorDeps<'_>,
    sessions: &mut SessionRegistry,
    ctx: &mut TaskContext,
) -> OrchestratorResult<()> {
    if deps.options.non_interactive {
        return Ok(());
    }

    let session = sessions.handle_for(coordination::AgentRole::Refiner);
    let refined = agents::refiner::refine(
        deps.provider,
        session,
        &ctx.working_directory,
        &ctx.human_task,
        None,
        deps.reporter,
    )
    .await?;

    publish(deps, DomainEvent::RefinementReady { refined_task: refined.clone() });
    publish(deps, DomainEvent::RefinementAwaitingApproval);

    let mut wanted = std::collections::HashSet::new();
    wanted.insert(CommandType::RefinementApprove);
    wanted.insert(CommandType::RefinementReject);
    match deps.commands.await_command(wanted).await {
        Command::RefinementApprove => {
            ctx.refined_task = Some(refined.clone());
            ctx.task_to_use = refined;
        }
        Command::RefinementReject { details } => {
            ctx.pending_injection = Some(details);
            ctx.task_to_use = ctx.human_task.clone();
        }
        _ => unreachable!("await_command only returns the requested types"),
    }
    Ok(())
}

/// PLANNING -> CURMUDGEONING, looping on Curmudgeon's simplify verdict up
/// to `max_simplifications` (§4.3's resolved Open Question, see DESIGN.md).
async fn run_planning_and_curmudgeon(deps: &OrchestratorDeps<'_>, ctx: &mut TaskContext) -> OrchestratorResult<bool> {
    loop {
        let plan = agents::planner::plan(
            deps.provider,
            &ctx.working_directory,
            &ctx.task_to_use,
            ctx.curmudgeon_feedback.as_deref(),
            ctx.retry_feedback.as_deref(),
            deps.reporter,
        )
        .await?;
        ctx.plan_markdown = Some(plan.clone());
        publish(deps, DomainEvent::PlanReady { plan_markdown: plan.clone() });

        // §4.7: an injection requested while the Planner was running is
        // delivered as the leading message of the *next* agent call
        // (Curmudgeon here), not folded into the Planner's own feedback.
        let injected = ctx.take_injection();
        let (verdict, _raw) = agents::curmudgeon::review(
            deps.provider,
            &ctx.working_directory,
            &plan,
            injected.as_deref(),
            deps.reporter,
        )
        .await?;
        publish(deps, DomainEvent::CurmudgeonFeedback { verdict: verdict.clone() });

        match verdict {
            CurmudgeonVerdict::Approve => return Ok(true),
            CurmudgeonVerdict::Simplify { feedback } => {
                ctx.simplification_count += 1;
                ctx.curmudgeon_feedback = Some(feedback);
                if ctx.simplification_count >= deps.options.max_simplifications {
                    ctx.last_error = Some("curmudgeon simplify bound reached".to_string());
                    return Ok(true);
                }
            }
            CurmudgeonVerdict::Reject { feedback } => {
                ctx.last_error = Some(feedback);
                return Ok(false);
            }
        }
    }
}

/// The inner BEAN_COUNTING/PLANNING/PLAN_REVIEW/IMPLEMENTING/CODE_REVIEW
/// cycle (§4.4), driven by its own `ExecutionStateMachine`.
async fn run_execution(
    deps: &OrchestratorDeps<'_>,
    task_fsm: &TaskStateMachine,
    sessions: &mut SessionRegistry,
    ctx: &mut TaskContext,
) -> OrchestratorResult<bool> {
    let mut exec_fsm = ExecutionStateMachine::new();
    let mut exec_ctx = ExecutionContext::default();
    let plan_markdown = ctx.plan_markdown.clone().unwrap_or_default();
    let mut completed_summary: Option<String> = None;
    let mut checkpoint_number = 1;

    exec_fsm.advance(ExecEvent::StartChunking)?;
    publish(deps, DomainEvent::PhaseChanged { exec_state: exec_fsm.current() });

    loop {
        let bean_counter_session = sessions.handle_for(coordination::AgentRole::BeanCounter);
        let (output, _raw) = agents::bean_counter::next_chunk(
            deps.provider,
            bean_counter_session,
            &ctx.working_directory,
            &plan_markdown,
            completed_summary.as_deref(),
            deps.reporter,
        )
        .await?;

        let chunk = match output {
            BeanCounterOutput::TaskComplete => {
                exec_fsm.advance(ExecEvent::BeanCounterTaskComplete)?;
                return Ok(true);
            }
            BeanCounterOutput::WorkChunk { description, requirements, context } => {
                Chunk { description, requirements, context }
            }
        };
        exec_fsm.advance(ExecEvent::WorkChunkEmitted)?;
        exec_ctx.current_chunk = Some(chunk.clone());
        publish(deps, DomainEvent::PhaseChanged { exec_state: exec_fsm.current() });

        // PLANNING / PLAN_REVIEW: propose-then-review, bounded by
        // max_plan_attempts (§9's resolved Open Question).
        let approved_plan = loop {
            exec_ctx.plan_attempts += 1;
            if exec_ctx.plan_attempts > deps.options.max_plan_attempts {
                exec_fsm.advance(ExecEvent::RevisePlanAttemptsExhausted)?;
                return Ok(false);
            }

            let coder_session = sessions.handle_for(coordination::AgentRole::Coder);
            let (proposal, _raw) = agents::coder::propose_plan_for_chunk(
                deps.provider,
                coder_session,
                &ctx.working_directory,
                &chunk,
                exec_ctx.plan_feedback.as_deref(),
                deps.reporter,
            )
            .await?;
            exec_fsm.advance(ExecEvent::PlanProposed)?;

            let reviewer_session = sessions.handle_for(coordination::AgentRole::Reviewer);
            let (verdict, _raw) = agents::reviewer::review_plan(
                deps.provider,
                reviewer_session,
                &ctx.working_directory,
                &proposal,
                deps.reporter,
            )
            .await?;
            publish(deps, DomainEvent::PlanVerdictIssued { verdict: verdict.clone() });

            match verdict {
                PlanVerdict::ApprovePlan | PlanVerdict::AlreadyComplete => {
                    exec_fsm.advance(ExecEvent::ApprovePlan)?;
                    break proposal;
                }
                PlanVerdict::RevisePlan { feedback } => {
                    exec_ctx.plan_feedback = Some(feedback);
                    exec_fsm.advance(ExecEvent::RevisePlan)?;
                }
                PlanVerdict::RejectPlan { feedback } | PlanVerdict::NeedsHuman { feedback } => {
                    if deps.options.non_interactive {
                        ctx.last_error = Some(feedback);
                        exec_fsm.advance(ExecEvent::RejectPlan)?;
                        return Ok(false);
                    }
                    exec_ctx.plan_feedback = Some(feedback);
                    exec_fsm.advance(ExecEvent::RejectPlan)?;
                }
            }
        };
        exec_ctx.current_plan = Some(approved_plan.clone());
        exec_ctx.reset_code_attempts();

        // IMPLEMENTING / CODE_REVIEW: apply-then-review, bounded by
        // max_code_attempts.
        loop {
            exec_ctx.code_attempts += 1;
            if exec_ctx.code_attempts > deps.options.max_code_attempts {
                exec_fsm.advance(ExecEvent::ReviseCodeAttemptsExhausted)?;
                return Ok(false);
            }

            let coder_session = sessions.handle_for(coordination::AgentRole::Coder);
            agents::coder::apply_code(
                deps.provider,
                coder_session,
                &ctx.working_directory,
                &approved_plan,
                exec_ctx.code_feedback.as_deref(),
                deps.reporter,
            )
            .await?;
            let commit = deps
                .git
                .commit(&ctx.working_directory, &format!("agneto: {}", approved_plan.description))
                .await
                .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;
            exec_fsm.advance(ExecEvent::CodeApplied)?;

            let diff = format!("commit {commit}");
            let reviewer_session = sessions.handle_for(coordination::AgentRole::Reviewer);
            let (verdict, _raw) = agents::reviewer::review_code(
                deps.provider,
                reviewer_session,
                &ctx.working_directory,
                &diff,
                false,
                deps.reporter,
            )
            .await?;
            publish(deps, DomainEvent::CodeVerdictIssued { verdict: verdict.clone() });

            match verdict {
                CodeVerdict::ApproveCode => {
                    exec_fsm.advance(ExecEvent::ApproveCode)?;
                    break;
                }
                CodeVerdict::StepComplete => {
                    exec_fsm.advance(ExecEvent::StepComplete)?;
                    break;
                }
                CodeVerdict::TaskComplete => {
                    exec_fsm.advance(ExecEvent::TaskCompleteVerdict)?;
                    return Ok(true);
                }
                CodeVerdict::ReviseCode { feedback } => {
                    exec_ctx.code_feedback = Some(feedback);
                    exec_fsm.advance(ExecEvent::ReviseCode)?;
                }
                CodeVerdict::RejectCode { feedback } | CodeVerdict::NeedsHuman { feedback } => {
                    if deps.options.non_interactive {
                        ctx.last_error = Some(feedback);
                        exec_fsm.advance(ExecEvent::RejectCode)?;
                        return Ok(false);
                    }
                    exec_ctx.code_feedback = Some(feedback);
                    exec_fsm.advance(ExecEvent::RejectCode)?;
                }
            }
        }

        completed_summary = describe_bean_counter_completion(&BeanCounterOutput::WorkChunk {
            description: chunk.description.clone(),
            requirements: chunk.requirements.clone(),
            context: chunk.context.clone(),
        });
        exec_ctx.reset_for_next_chunk();
        checkpoint_number += 1;
        let snapshot = git_snapshot_for(deps, ctx).await.unwrap_or_else(|_| GitSnapshot {
            current_branch: format!("agneto/task-{}", ctx.task_id),
            baseline_commit: ctx.baseline_commit.clone().unwrap_or_default(),
            task_commits: vec![],
        });
        maybe_checkpoint(
            deps,
            checkpoint_number,
            "CHUNK_COMPLETE",
            task_fsm,
            Some(&exec_fsm),
            Some(exec_ctx.clone()),
            sessions,
            ctx,
            snapshot,
        );
    }
}

async fn run_super_review(deps: &OrchestratorDeps<'_>, ctx: &mut TaskContext) -> OrchestratorResult<bool> {
    let head = deps
        .git
        .current_commit(&ctx.working_directory)
        .await
        .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;
    let diff = format!("final diff up to {head}");

    let (verdict, _raw) = agents::super_reviewer::review(deps.provider, &ctx.working_directory, &diff, deps.reporter).await?;
    publish(deps, DomainEvent::SuperReviewComplete { verdict: verdict.clone() });
    ctx.super_review_result = Some(verdict.clone());

    match verdict.outcome {
        SuperReviewerOutcome::Approve => Ok(true),
        SuperReviewerOutcome::NeedsHuman => {
            if deps.options.non_interactive {
                ctx.last_error = Some(verdict.summary);
                return Ok(false);
            }
            publish(deps, DomainEvent::SuperReviewAwaitingApproval);
            let mut wanted = std::collections::HashSet::new();
            wanted.insert(CommandType::HumanReviewApprove);
            wanted.insert(CommandType::HumanReviewRetry);
            wanted.insert(CommandType::HumanReviewReject);
            match deps.commands.await_command(wanted).await {
                Command::HumanReviewApprove => Ok(true),
                Command::HumanReviewRetry { feedback } => {
                    ctx.retry_feedback = Some(feedback);
                    Ok(false)
                }
                Command::HumanReviewReject { feedback } => {
                    ctx.last_error = Some(feedback);
                    Ok(false)
                }
                _ => unreachable!("await_command only returns the requested types"),
            }
        }
    }
}

/// Entry point for one task run from INIT to COMPLETE/ABANDONED.
/// Returns the terminal `TaskState` reached.
pub async fn run_task(deps: &OrchestratorDeps<'_>, ctx: &mut TaskContext) -> OrchestratorResult<TaskState> {
    let mut sessions = SessionRegistry::new();
    let mut task_fsm = TaskStateMachine::new();

    ctx.baseline_commit = Some(
        deps.git
            .current_commit(&ctx.working_directory)
            .await
            .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?,
    );

    task_fsm.advance(TaskEvent::StartTask { interactive: !deps.options.non_interactive }, "task started")?;
    publish(
        deps,
        DomainEvent::StateChanged { from: TaskState::Init, to: task_fsm.current(), reason: "started".into() },
    );

    if task_fsm.current() == TaskState::Refining {
        run_refining(deps, &mut sessions, ctx).await?;
        task_fsm.advance(TaskEvent::RefinementComplete, "refinement accepted")?;
    }

    loop {
        let plan_ok = run_planning_and_curmudgeon(deps, ctx).await?;
        if !plan_ok {
            task_fsm.advance(TaskEvent::PlanFailed, ctx.last_error.clone().unwrap_or_default())?;
            return Ok(task_fsm.current());
        }
        task_fsm.advance(TaskEvent::PlanCreated, "plan approved by curmudgeon")?;
        let snapshot = git_snapshot_for(deps, ctx).await?;
        maybe_checkpoint(deps, 1, "PLAN_CREATED", &task_fsm, None, None, &sessions, ctx, snapshot);

        task_fsm.advance(TaskEvent::CurmudgeonApproved, "entering execution")?;
        publish(deps, DomainEvent::PhaseChanged { exec_state: ExecState::TaskStart });

        let exec_ok = run_execution(deps, &task_fsm, &mut sessions, ctx).await?;
        if !exec_ok {
            task_fsm.advance(TaskEvent::ExecutionFailed, ctx.last_error.clone().unwrap_or_default())?;
            return Ok(task_fsm.current());
        }
        task_fsm.advance(TaskEvent::ExecutionComplete, "all chunks complete")?;

        let review_ok = run_super_review(deps, ctx).await?;
        if review_ok {
            task_fsm.advance(TaskEvent::SuperReviewPassed, "super review approved")?;
            break;
        }
        if ctx.last_error.is_some() {
            task_fsm.advance(TaskEvent::HumanAbandon, ctx.last_error.clone().unwrap())?;
            return Ok(task_fsm.current());
        }
        // Retry: fold super-reviewer feedback back into another plan round.
        task_fsm.advance(TaskEvent::HumanRetry, "retrying after super review feedback")?;
    }

    let summary = ctx.plan_markdown.clone().unwrap_or_default();
    let gardener_result = agents::gardener::update_notes(deps.provider, &ctx.working_directory, &summary, deps.reporter).await;
    publish(deps, DomainEvent::GardenerComplete { result: gardener_result });
    task_fsm.advance(TaskEvent::GardeningComplete, "notes updated")?;

    if deps.options.auto_merge {
        deps.git
            .merge_to_default_branch(&ctx.working_directory)
            .await
            .map_err(|e| OrchestratorError::GitFailure(e.to_string()))?;
    }

    {
        let metrics = deps.metrics.lock().expect("metrics mutex poisoned");
        deps.reporter.phase(coordination::AgentRole::Gardener, &format!("task complete\n{metrics}"));
    }

    Ok(task_fsm.current())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use coordination::{GitBridgeError, ProviderError, ProviderResponse};

    use super::*;

    /// Replays scripted replies in call order and records every request
    /// it received, so assertions can inspect what each agent was asked.
    struct ScriptedProvider {
        responses: StdMutex<VecDeque<String>>,
        requests: StdMutex<Vec<coordination::ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: StdMutex::new(responses.into_iter().map(String::from).collect()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, index: usize) -> coordination::ProviderRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn query(&self, request: coordination::ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let raw = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::CallFailed("scripted responses exhausted".to_string()))?;
            Ok(ProviderResponse { raw, cost: 0.0, duration_ms: 0, tokens: 0 })
        }
    }

    /// In-memory git double: commits are just an incrementing counter,
    /// everything else is a trivial success.
    struct FakeGit {
        commit_counter: AtomicU64,
        merged: StdMutex<bool>,
    }

    impl FakeGit {
        fn new() -> Self {
            Self { commit_counter: AtomicU64::new(0), merged: StdMutex::new(false) }
        }
    }

    #[async_trait]
    impl GitBridge for FakeGit {
        async fn ensure_worktree(&self, _task_id: &str) -> Result<PathBuf, GitBridgeError> {
            Ok(PathBuf::from("/tmp/fake-worktree"))
        }
        async fn apply_patch(&self, _cwd: &Path, _patch: &str) -> Result<(), GitBridgeError> {
            Ok(())
        }
        async fn commit(&self, _cwd: &Path, _message: &str) -> Result<String, GitBridgeError> {
            let n = self.commit_counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("commit{n}"))
        }
        async fn current_commit(&self, _cwd: &Path) -> Result<String, GitBridgeError> {
            let n = self.commit_counter.load(Ordering::SeqCst);
            Ok(if n == 0 { "base0".to_string() } else { format!("commit{n}") })
        }
        async fn reset_to(&self, _cwd: &Path, _commit: &str) -> Result<(), GitBridgeError> {
            Ok(())
        }
        async fn cherry_pick(&self, _cwd: &Path, _commit: &str) -> Result<(), GitBridgeError> {
            Ok(())
        }
        async fn has_uncommitted_changes(&self, _cwd: &Path) -> Result<bool, GitBridgeError> {
            Ok(false)
        }
        async fn stash_with_marker(&self, _cwd: &Path, _marker: &str) -> Result<(), GitBridgeError> {
            Ok(())
        }
        async fn merge_to_default_branch(&self, _cwd: &Path) -> Result<(), GitBridgeError> {
            *self.merged.lock().unwrap() = true;
            Ok(())
        }
        async fn commit_exists(&self, _cwd: &Path, _commit: &str) -> Result<bool, GitBridgeError> {
            Ok(true)
        }
    }

    /// Owns everything an `OrchestratorDeps` borrows from, so each test
    /// only has to supply the provider/git doubles and options.
    struct DepsOwned {
        commands: CommandBus,
        events: EventBus,
        dashboard: Dashboard,
        metrics: std::sync::Mutex<MetricsCollector>,
        reporter: Reporter,
        _checkpoint_tmp: tempfile::TempDir,
        checkpoint_dir: PathBuf,
    }

    impl DepsOwned {
        fn new(task_id: &str) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let checkpoint_dir = tmp.path().join("checkpoints");
            Self {
                commands: CommandBus::new(),
                events: EventBus::default(),
                dashboard: Dashboard::from_endpoint(None),
                metrics: std::sync::Mutex::new(MetricsCollector::new()),
                reporter: Reporter::new(task_id),
                _checkpoint_tmp: tmp,
                checkpoint_dir,
            }
        }

        fn deps<'a>(
            &'a self,
            provider: &'a dyn LlmProvider,
            git: &'a dyn GitBridge,
            options: &'a OrchestratorOptions,
        ) -> OrchestratorDeps<'a> {
            OrchestratorDeps {
                provider,
                git,
                commands: &self.commands,
                events: &self.events,
                dashboard: &self.dashboard,
                metrics: &self.metrics,
                reporter: &self.reporter,
                options,
                checkpoint_dir: self.checkpoint_dir.clone(),
            }
        }
    }

    // S1 — happy path, non-interactive, one chunk, auto-merge.
    #[tokio::test]
    async fn s1_happy_path_non_interactive() {
        let provider = ScriptedProvider::new(vec![
            "# Plan\n1. write hello.txt",
            "approve",
            "## Write hello.txt\n- create the file\nsome context",
            r#"{"description":"write hello.txt","steps":["create file"],"affected_files":["hello.txt"]}"#,
            r#"{"verdict":"approve-plan"}"#,
            "applied the change",
            r#"{"verdict":"task-complete"}"#,
            r#"{"outcome":"approve","summary":"looks good","issues":[]}"#,
            r#"{"success":true,"sections_updated":["progress"],"error":null}"#,
        ]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s1");
        let options = OrchestratorOptions::new(true, true);
        let deps = owned.deps(&provider, &git, &options);

        let mut ctx = TaskContext::new("s1", "write hello.txt saying hi", PathBuf::from("/tmp/fake-worktree"));
        let result = run_task(&deps, &mut ctx).await.unwrap();

        assert_eq!(result, TaskState::Complete);
        assert_eq!(git.commit_counter.load(Ordering::SeqCst), 1);
        assert!(*git.merged.lock().unwrap());
        assert_eq!(provider.call_count(), 9);
    }

    // S2 — Curmudgeon simplify loop bound: 4 simplify verdicts in a row
    // with max_simplifications = 4 accepts the plan rather than failing.
    #[tokio::test]
    async fn s2_curmudgeon_simplify_loop_bound() {
        let provider = ScriptedProvider::new(vec![
            "plan v1", "simplify: too many steps",
            "plan v2", "simplify: still too many",
            "plan v3", "simplify: one more pass",
            "plan v4", "simplify: final pass",
        ]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s2");
        let options = OrchestratorOptions::new(false, true);
        let deps = owned.deps(&provider, &git, &options);

        let mut ctx = TaskContext::new("s2", "some task", PathBuf::from("/tmp/fake-worktree"));
        let accepted = run_planning_and_curmudgeon(&deps, &mut ctx).await.unwrap();

        assert!(accepted);
        assert_eq!(ctx.simplification_count, 4);
        assert!(ctx.last_error.as_deref().unwrap().contains("simplify bound"));
        assert_eq!(provider.call_count(), 8);
    }

    // S3 — Reviewer revise-plan then approve: the Coder is re-invoked
    // with the Reviewer's feedback on the second attempt.
    #[tokio::test]
    async fn s3_reviewer_revise_plan_then_approve() {
        let provider = ScriptedProvider::new(vec![
            "## Do the thing\n- step one\nsome context",
            r#"{"description":"first try","steps":["do it"],"affected_files":[]}"#,
            r#"{"verdict":"revise-plan","feedback":"add a test"}"#,
            r#"{"description":"second try","steps":["do it","add a test"],"affected_files":[]}"#,
            r#"{"verdict":"approve-plan"}"#,
            "applied",
            r#"{"verdict":"task-complete"}"#,
        ]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s3");
        let options = OrchestratorOptions::new(false, true);
        let deps = owned.deps(&provider, &git, &options);

        let mut ctx = TaskContext::new("s3", "some task", PathBuf::from("/tmp/fake-worktree"));
        ctx.plan_markdown = Some("# Plan\n1. do the thing".to_string());
        let mut sessions = SessionRegistry::new();
        let task_fsm = TaskStateMachine::new();

        let completed = run_execution(&deps, &task_fsm, &mut sessions, &mut ctx).await.unwrap();
        assert!(completed);

        let propose_calls: Vec<_> = (0..provider.call_count())
            .map(|i| provider.request(i))
            .filter(|r| r.mode == coordination::ProviderMode::Propose)
            .collect();
        assert_eq!(propose_calls.len(), 2);
        assert!(!propose_calls[0].messages[0].content.contains("add a test"));
        assert!(propose_calls[1].messages[0].content.contains("add a test"));
    }

    // S4 — human retry on SuperReviewer: a queued HumanReviewRetry
    // command resolves the pending approval with the feedback attached.
    #[tokio::test]
    async fn s4_human_retry_on_super_reviewer() {
        let provider = ScriptedProvider::new(vec![r#"{"outcome":"needs_human","summary":"check this","issues":["lint warnings"]}"#]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s4");
        let options = OrchestratorOptions::new(false, false);
        let deps = owned.deps(&provider, &git, &options);

        deps.commands
            .send(Command::HumanReviewRetry { feedback: "fix lints".to_string() })
            .unwrap();

        let mut ctx = TaskContext::new("s4", "some task", PathBuf::from("/tmp/fake-worktree"));
        let passed = run_super_review(&deps, &mut ctx).await.unwrap();

        assert!(!passed);
        assert_eq!(ctx.retry_feedback.as_deref(), Some("fix lints"));
        assert!(ctx.last_error.is_none());
    }

    // S5 — checkpoint restore after PLAN_CREATED: the checkpoint the
    // orchestrator writes at that trigger restores to CURMUDGEONING
    // without invoking any agent.
    #[tokio::test]
    async fn s5_checkpoint_restore_after_plan_created() {
        let provider = ScriptedProvider::new(vec![]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s5");
        let options = OrchestratorOptions::new(false, true);
        let deps = owned.deps(&provider, &git, &options);

        let mut ctx = TaskContext::new("s5", "write hello.txt", PathBuf::from("/tmp/fake-worktree"));
        ctx.baseline_commit = Some("base0".to_string());
        ctx.plan_markdown = Some("# Plan\n1. write file".to_string());

        let mut task_fsm = TaskStateMachine::new();
        task_fsm.advance(TaskEvent::StartTask { interactive: false }, "start").unwrap();
        task_fsm.advance(TaskEvent::PlanCreated, "approved").unwrap();
        assert_eq!(task_fsm.current(), TaskState::Curmudgeoning);

        let sessions = SessionRegistry::new();
        let snapshot = git_snapshot_for(&deps, &ctx).await.unwrap();
        maybe_checkpoint(&deps, 1, "PLAN_CREATED", &task_fsm, None, None, &sessions, &ctx, snapshot);

        let loaded = coordination::load_latest_checkpoint(&deps.checkpoint_dir)
            .unwrap()
            .expect("checkpoint written at PLAN_CREATED");
        let resumed = coordination::restore_from_checkpoint(loaded, "s5", &git).await.unwrap();

        match resumed {
            coordination::ResumeResult::Restored { task_fsm: restored_fsm, task_context, .. } => {
                assert_eq!(restored_fsm.current(), TaskState::Curmudgeoning);
                assert_eq!(task_context.task_id, "s5");
                assert_eq!(task_context.plan_markdown.as_deref(), Some("# Plan\n1. write file"));
            }
            other => panic!("expected Restored, got {other:?}"),
        }
        // Restoration never calls the Planner (or any agent) again.
        assert_eq!(provider.call_count(), 0);
    }

    // S6 — dynamic injection: text queued while the Planner was running
    // is delivered as the leading message of the next agent call
    // (Curmudgeon), then cleared.
    #[tokio::test]
    async fn s6_dynamic_injection_reaches_next_agent_call() {
        let provider = ScriptedProvider::new(vec!["# Plan\n1. step one", "approve"]);
        let git = FakeGit::new();
        let owned = DepsOwned::new("s6");
        let options = OrchestratorOptions::new(false, true);
        let deps = owned.deps(&provider, &git, &options);

        let mut ctx = TaskContext::new("s6", "some task", PathBuf::from("/tmp/fake-worktree"));
        ctx.pending_injection = Some("use TypeScript strict mode".to_string());

        let accepted = run_planning_and_curmudgeon(&deps, &mut ctx).await.unwrap();

        assert!(accepted);
        assert!(ctx.pending_injection.is_none());

        let planner_request = provider.request(0);
        assert!(!planner_request.messages[0].content.contains("use TypeScript strict mode"));

        let curmudgeon_request = provider.request(1);
        assert_eq!(curmudgeon_request.messages[0].content, "use TypeScript strict mode");
        assert_eq!(curmudgeon_request.messages.len(), 2);
    }
}
