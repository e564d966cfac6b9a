//! The tool-dispatch loop.
//!
//! One decision, one execution, one result, repeat. Every per-operation
//! failure is converted into history data for the engine to react to;
//! only loop-level invariant violations (budget, deadline, a broken engine)
//! terminate the run, and even then the full history is returned.

use std::time::Instant;

use quill_github::{CommitAuthor, GitHubApi};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::branch_name::BranchName;
use crate::changeset::ChangeSet;
use crate::engine::{Decision, DecisionEngine, EngineContext, EngineError, FileChange};
use crate::error::{Error, FailureKind, Result};
use crate::path::TreePath;
use crate::workspace::{BranchState, RepoId, RepoWorkspace};

/// Default iteration budget for a run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 16;

/// Operation name recorded in a history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// The initial base-branch state read.
    ReadState,
    /// Branch creation.
    CreateBranch,
    /// Atomic multi-file commit.
    WriteFiles,
    /// Pull-request creation.
    OpenPullRequest,
    /// An operation name outside the closed set, kept verbatim for audit.
    #[serde(untagged)]
    Other(String),
}

/// Result of one executed operation, as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// The operation succeeded.
    Success {
        /// Operation-specific result payload.
        #[serde(default)]
        details: serde_json::Value,
    },
    /// The operation failed; the engine may choose a corrective action.
    Failure {
        /// Failure classification.
        kind: FailureKind,
        /// Human-readable description.
        message: String,
    },
}

impl OperationOutcome {
    /// Whether this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One entry of the run's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Which operation ran.
    pub operation: OperationKind,
    /// Its arguments (large payloads like file contents are elided).
    pub arguments: serde_json::Value,
    /// What happened.
    pub outcome: OperationOutcome,
}

/// Why a run ended fatally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FatalReason {
    /// The engine never signalled completion within the iteration budget.
    #[error("decision loop exceeded its budget of {limit} iterations")]
    LoopBudgetExceeded {
        /// The configured bound.
        limit: u32,
    },

    /// The configured deadline passed between iterations.
    #[error("deadline passed before the run completed")]
    DeadlineExceeded,

    /// The engine broke the protocol or its backend failed.
    #[error("decision engine failed: {message}")]
    EngineFailed {
        /// The underlying engine error.
        message: String,
    },
}

/// Terminal status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The engine explicitly signalled completion.
    Completed,
    /// The run was terminated by the loop.
    FatalError {
        /// Why.
        reason: FatalReason,
    },
}

/// Final result of a run: terminal status plus the full ordered history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// How the run ended.
    pub status: RunStatus,
    /// Every operation with its outcome, in execution order.
    pub history: Vec<ExecutionRecord>,
}

impl RunReport {
    /// Whether the run completed normally.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// Bounds on a run.
#[derive(Debug, Clone, Copy)]
pub struct LoopBudget {
    /// Maximum number of executed decisions.
    pub max_iterations: u32,
    /// Optional wall-clock cutoff, checked between iterations.
    pub deadline: Option<Instant>,
}

impl Default for LoopBudget {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            deadline: None,
        }
    }
}

impl LoopBudget {
    /// Budget with an iteration bound and no deadline.
    #[must_use]
    pub const fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            deadline: None,
        }
    }

    /// Attach a wall-clock deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The dispatch loop driving one run.
pub struct ToolLoop<'a, H: GitHubApi, E: DecisionEngine> {
    workspace: RepoWorkspace<'a, H>,
    engine: &'a E,
    goal: String,
    base_branch: BranchName,
    author: Option<CommitAuthor>,
    budget: LoopBudget,
}

impl<'a, H: GitHubApi, E: DecisionEngine> ToolLoop<'a, H, E> {
    /// Create a loop over one repository with a given goal.
    pub fn new(
        github: &'a H,
        engine: &'a E,
        repo: RepoId,
        goal: impl Into<String>,
        base_branch: BranchName,
    ) -> Self {
        Self {
            workspace: RepoWorkspace::new(github, repo),
            engine,
            goal: goal.into(),
            base_branch,
            author: None,
            budget: LoopBudget::default(),
        }
    }

    /// Replace the default budget.
    #[must_use]
    pub const fn with_budget(mut self, budget: LoopBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the commit author identity for commits made by this run.
    #[must_use]
    pub fn with_author(mut self, author: CommitAuthor) -> Self {
        self.author = Some(author);
        self
    }

    /// Run to completion or a fatal error. Never panics, never loses history.
    pub async fn run(self) -> RunReport {
        let mut history: Vec<ExecutionRecord> = Vec::new();
        let mut snapshot: Option<BranchState> = None;

        info!(
            repo = %self.workspace.repo(),
            base = %self.base_branch,
            budget = self.budget.max_iterations,
            "starting run"
        );

        // Establish the starting point. A failure here is recorded, not
        // fatal - the engine may still create the branch or pick another.
        let arguments = json!({ "branch": self.base_branch.as_str() });
        match self.workspace.branch_state(&self.base_branch).await {
            Ok(state) => {
                history.push(ExecutionRecord {
                    operation: OperationKind::ReadState,
                    arguments,
                    outcome: OperationOutcome::Success {
                        details: serde_json::to_value(&state).unwrap_or_default(),
                    },
                });
                snapshot = Some(state);
            }
            Err(err) => {
                warn!(branch = %self.base_branch, error = %err, "initial state read failed");
                history.push(ExecutionRecord {
                    operation: OperationKind::ReadState,
                    arguments,
                    outcome: failure(&err),
                });
            }
        }

        for iteration in 0..self.budget.max_iterations {
            if self.budget.deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(iteration, "deadline passed, terminating run");
                return RunReport {
                    status: RunStatus::FatalError {
                        reason: FatalReason::DeadlineExceeded,
                    },
                    history,
                };
            }

            let ctx = EngineContext {
                goal: &self.goal,
                repository: self.workspace.repo(),
                base_branch: self.base_branch.as_str(),
                snapshot: snapshot.as_ref(),
                history: &history,
                iteration,
                max_iterations: self.budget.max_iterations,
            };

            let decision = match self.engine.decide(&ctx).await {
                Ok(decision) => decision,
                Err(EngineError::UnknownOperation(op)) => {
                    warn!(op = %op, "engine requested unknown operation");
                    history.push(ExecutionRecord {
                        operation: OperationKind::Other(op.clone()),
                        arguments: serde_json::Value::Null,
                        outcome: OperationOutcome::Failure {
                            kind: FailureKind::InvalidState,
                            message: format!("unknown operation '{op}'"),
                        },
                    });
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "engine failed, terminating run");
                    return RunReport {
                        status: RunStatus::FatalError {
                            reason: FatalReason::EngineFailed {
                                message: err.to_string(),
                            },
                        },
                        history,
                    };
                }
            };

            if matches!(decision, Decision::Finish) {
                info!(iterations = iteration, "engine signalled completion");
                return RunReport {
                    status: RunStatus::Completed,
                    history,
                };
            }

            let (operation, arguments) = describe(&decision);
            debug!(?operation, "executing decision");

            let outcome = match self.execute(decision).await {
                Ok((details, new_snapshot)) => {
                    if let Some(state) = new_snapshot {
                        snapshot = Some(state);
                    }
                    OperationOutcome::Success { details }
                }
                Err(err) => {
                    warn!(?operation, error = %err, "operation failed");
                    failure(&err)
                }
            };
            history.push(ExecutionRecord {
                operation,
                arguments,
                outcome,
            });
        }

        warn!(
            limit = self.budget.max_iterations,
            "iteration budget exhausted"
        );
        RunReport {
            status: RunStatus::FatalError {
                reason: FatalReason::LoopBudgetExceeded {
                    limit: self.budget.max_iterations,
                },
            },
            history,
        }
    }

    /// Execute one non-finish decision, returning result details and an
    /// optional refreshed snapshot.
    async fn execute(
        &self,
        decision: Decision,
    ) -> Result<(serde_json::Value, Option<BranchState>)> {
        match decision {
            Decision::CreateBranch { name, source } => {
                let name = BranchName::new(name)?;
                let source = BranchName::new(source)?;
                let source_state = self.workspace.branch_state(&source).await?;
                let created = self
                    .workspace
                    .create_branch(&name, &source_state.head_sha)
                    .await?;
                let state = BranchState {
                    branch: name.into_inner(),
                    head_sha: source_state.head_sha,
                    tree_sha: source_state.tree_sha,
                };
                Ok((
                    json!({ "ref": created.ref_name, "sha": created.sha }),
                    Some(state),
                ))
            }

            Decision::WriteFiles {
                branch,
                message,
                changes,
            } => {
                let branch = BranchName::new(branch)?;
                let set = changeset_from(changes)?;
                let outcome = self
                    .workspace
                    .commit_changes(&branch, &message, self.author.as_ref(), &set)
                    .await?;
                let state = BranchState {
                    branch: outcome.branch.clone(),
                    head_sha: outcome.commit_sha.clone(),
                    tree_sha: outcome.tree_sha.clone(),
                };
                Ok((
                    serde_json::to_value(&outcome).unwrap_or_default(),
                    Some(state),
                ))
            }

            Decision::OpenPullRequest {
                head,
                base,
                title,
                body,
                draft,
            } => {
                let head = BranchName::new(head)?;
                let base = BranchName::new(base)?;
                let pr = self
                    .workspace
                    .open_pull_request(&head, &base, &title, &body, draft)
                    .await?;
                Ok((json!({ "number": pr.number, "url": pr.html_url }), None))
            }

            // Intercepted by the loop before execution.
            Decision::Finish => Ok((serde_json::Value::Null, None)),
        }
    }
}

/// Convert an error into a failure outcome.
fn failure(err: &Error) -> OperationOutcome {
    OperationOutcome::Failure {
        kind: err.kind(),
        message: err.to_string(),
    }
}

/// Validate engine-supplied file changes into a change set.
fn changeset_from(changes: Vec<FileChange>) -> Result<ChangeSet> {
    if changes.is_empty() {
        return Err(Error::InvalidState(
            "write_files requires at least one change".into(),
        ));
    }

    let mut set = ChangeSet::new();
    for change in changes {
        let path = TreePath::new(&change.path)?;
        if change.delete {
            if change.content.is_some() {
                return Err(Error::InvalidState(format!(
                    "change for '{path}' sets both content and delete"
                )));
            }
            set.delete(path);
        } else {
            let content = change.content.ok_or_else(|| {
                Error::InvalidState(format!("change for '{path}' has neither content nor delete"))
            })?;
            set.write(path, content.into_bytes());
        }
    }
    Ok(set)
}

/// Operation name and audit arguments for a decision.
///
/// File contents and PR bodies are elided from the audit trail; paths and
/// titles are enough to reconstruct what was attempted.
fn describe(decision: &Decision) -> (OperationKind, serde_json::Value) {
    match decision {
        Decision::CreateBranch { name, source } => (
            OperationKind::CreateBranch,
            json!({ "name": name, "source": source }),
        ),
        Decision::WriteFiles {
            branch,
            message,
            changes,
        } => {
            let files: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
            (
                OperationKind::WriteFiles,
                json!({ "branch": branch, "message": message, "files": files }),
            )
        }
        Decision::OpenPullRequest {
            head, base, title, ..
        } => (
            OperationKind::OpenPullRequest,
            json!({ "head": head, "base": base, "title": title }),
        ),
        Decision::Finish => (OperationKind::Other("finish".into()), serde_json::Value::Null),
    }
}
