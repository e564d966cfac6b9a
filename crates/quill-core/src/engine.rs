//! The decision-engine contract.
//!
//! The reasoning component that picks the next operation is an opaque
//! collaborator. The core only defines the wire format: a serializable
//! [`EngineContext`] going out and exactly one [`Decision`] coming back per
//! iteration.

use serde::{Deserialize, Serialize};

use crate::dispatch::ExecutionRecord;
use crate::workspace::{BranchState, RepoId};

/// One file-level change inside a `write_files` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path.
    pub path: String,

    /// New file content; required unless `delete` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Remove the path instead of writing it.
    #[serde(default)]
    pub delete: bool,
}

/// One operation chosen by the decision engine.
///
/// A closed set: anything else the engine names is rejected as an unknown
/// operation rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Decision {
    /// Create a branch whose head is the current head of `source`.
    CreateBranch {
        /// New branch name.
        name: String,
        /// Branch to start from.
        source: String,
    },

    /// Commit a set of file changes to a branch as one atomic commit.
    WriteFiles {
        /// Target branch.
        branch: String,
        /// Commit message.
        message: String,
        /// The changes, applied together.
        changes: Vec<FileChange>,
    },

    /// Open a pull request; title and body pass through verbatim.
    OpenPullRequest {
        /// Head branch.
        head: String,
        /// Base branch.
        base: String,
        /// PR title.
        title: String,
        /// PR body.
        body: String,
        /// Create as draft.
        #[serde(default)]
        draft: bool,
    },

    /// The goal is met; stop the loop.
    Finish,
}

impl Decision {
    /// Parse a decision from a JSON value.
    ///
    /// Distinguishes an unrecognized operation name (recoverable - the loop
    /// reports it back to the engine) from a structurally malformed reply
    /// (fatal).
    ///
    /// # Errors
    /// [`EngineError::UnknownOperation`] or [`EngineError::Malformed`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, EngineError> {
        let op = value
            .get("op")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EngineError::Malformed("decision has no 'op' field".into()))?;

        match serde_json::from_value(value.clone()) {
            Ok(decision) => Ok(decision),
            Err(err) => {
                if matches!(
                    op,
                    "create_branch" | "write_files" | "open_pull_request" | "finish"
                ) {
                    Err(EngineError::Malformed(err.to_string()))
                } else {
                    Err(EngineError::UnknownOperation(op.to_string()))
                }
            }
        }
    }
}

/// Errors at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine named an operation outside the closed set.
    #[error("engine requested unknown operation '{0}'")]
    UnknownOperation(String),

    /// The engine's reply could not be parsed as a decision.
    #[error("malformed decision: {0}")]
    Malformed(String),

    /// The engine backend itself failed (process, transport, timeout).
    #[error("engine backend failure: {0}")]
    Backend(String),
}

/// Everything the engine sees when asked for the next decision.
#[derive(Debug, Serialize)]
pub struct EngineContext<'a> {
    /// The natural-language goal for this run.
    pub goal: &'a str,

    /// Target repository.
    pub repository: &'a RepoId,

    /// Branch the run started from.
    pub base_branch: &'a str,

    /// Last-known branch state (refreshed after successful mutations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<&'a BranchState>,

    /// Every prior operation and its outcome, in order.
    pub history: &'a [ExecutionRecord],

    /// Zero-based index of the upcoming iteration.
    pub iteration: u32,

    /// Iteration budget for the whole run.
    pub max_iterations: u32,
}

/// A component that picks the next operation.
///
/// Implementations must not keep ambient state about the run: everything
/// they may rely on is in the context, so independent loop runs stay
/// isolated and tests can script replies.
pub trait DecisionEngine: Send + Sync {
    /// Return exactly one decision for the given context.
    fn decide(
        &self,
        ctx: &EngineContext<'_>,
    ) -> impl std::future::Future<Output = Result<Decision, EngineError>> + Send;
}
