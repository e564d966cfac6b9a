//! # quill-core
//!
//! Core library for Quill: an external decision engine drives GitHub
//! repository mutations - branch creation, atomic multi-file commits built
//! from the git object graph, pull-request creation - through a bounded
//! dispatch loop.
//!
//! The crate is generic over [`quill_github::GitHubApi`], so everything here
//! can be exercised against an in-memory fake. Nothing touches a local
//! working tree; all object operations go through the remote API.

mod branch_name;
mod changeset;
mod dispatch;
mod engine;
mod error;
mod path;
mod tree;
mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use branch_name::BranchName;
pub use changeset::{Change, ChangeSet};
pub use dispatch::{
    DEFAULT_MAX_ITERATIONS, ExecutionRecord, FatalReason, LoopBudget, OperationKind,
    OperationOutcome, RunReport, RunStatus, ToolLoop,
};
pub use engine::{Decision, DecisionEngine, EngineContext, EngineError, FileChange};
pub use error::{Error, FailureKind, Result};
pub use path::{MAX_DEPTH, TreePath};
pub use workspace::{BranchState, CommitOutcome, RepoId, RepoWorkspace};
