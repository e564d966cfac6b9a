//! # quill-github
//!
//! GitHub API integration for Quill: the low-level git object graph
//! (blobs, trees, commits, refs) plus pull-request creation.
//!
//! # Security
//!
//! Authentication tokens are stored using `SecretString` which automatically
//! zeroizes memory when dropped, reducing credential exposure in memory dumps.

mod auth;
mod client;
mod error;
mod types;

pub mod traits;

pub use auth::Auth;
pub use client::GitHubClient;
pub use error::{Error, Result};
// Re-export SecretString for constructing Auth::Token
pub use secrecy::SecretString;
pub use traits::GitHubApi;
pub use types::{
    CommitAuthor, CommitObject, CreateCommit, CreatePullRequest, GitRef, NewTreeEntry, PullRequest,
    TreeEntry, TreeEntryKind, TreeObject,
};
