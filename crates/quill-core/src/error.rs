//! Error types for quill-core.

use serde::{Deserialize, Serialize};

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mutating a repository.
///
/// Every variant maps onto a [`FailureKind`], which is what ends up in the
/// dispatch loop's history records.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A branch, commit, or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A ref with the requested name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The target ref moved concurrently; the commit must be rebuilt
    /// against fresh state.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    /// A change path is malformed or traverses a non-directory entry.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The request is well-formed but cannot be satisfied.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid branch name.
    #[error("invalid branch name '{name}': {reason}")]
    InvalidBranchName {
        /// The invalid name.
        name: String,
        /// Why the name is invalid.
        reason: String,
    },

    /// The remote service refused the operation (auth, transport, rate limit).
    #[error("remote rejected the operation: {0}")]
    RemoteRejected(String),
}

impl Error {
    /// The failure classification recorded in history entries.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::AlreadyExists(_) => FailureKind::AlreadyExists,
            Self::Conflict(_) => FailureKind::Conflict,
            Self::InvalidPath { .. } => FailureKind::InvalidPath,
            Self::InvalidState(_) | Self::InvalidBranchName { .. } => FailureKind::InvalidState,
            Self::RemoteRejected(_) => FailureKind::RemoteRejected,
        }
    }
}

impl From<quill_github::Error> for Error {
    fn from(err: quill_github::Error) -> Self {
        use quill_github::Error as Gh;

        match err {
            Gh::NotFound(message) => Self::NotFound(message),
            Gh::ReferenceExists(message) => Self::AlreadyExists(message),
            Gh::NotFastForward(message) => Self::Conflict(message),
            Gh::Unprocessable { message } => Self::InvalidState(message),
            other => Self::RemoteRejected(other.to_string()),
        }
    }
}

/// Classification of a failed operation, as seen by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Branch or commit absent; the engine may pick another target.
    NotFound,
    /// Naming collision.
    AlreadyExists,
    /// Ref moved concurrently; re-read state and rebuild the commit.
    Conflict,
    /// Malformed change path.
    InvalidPath,
    /// Malformed or unsatisfiable request.
    InvalidState,
    /// Auth, transport, or rate-limit failure at the remote.
    RemoteRejected,
}
