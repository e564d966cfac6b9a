//! Trait abstraction for GitHub API operations.
//!
//! This module defines the `GitHubApi` trait which abstracts the git-data
//! and pull-request endpoints, enabling dependency injection and testability.

use crate::{
    CommitObject, CreateCommit, CreatePullRequest, GitHubClient, GitRef, NewTreeEntry, PullRequest,
    Result, TreeObject,
};

/// Trait for GitHub API operations.
///
/// This trait abstracts GitHub API calls, allowing for:
/// - Dependency injection in services
/// - Mock implementations for testing
///
/// All methods take `owner` and `repo` as parameters to support
/// operations across different repositories.
pub trait GitHubApi: Send + Sync {
    // === Ref Operations ===

    /// Resolve a branch to the commit its ref points at.
    fn get_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> impl std::future::Future<Output = Result<GitRef>> + Send;

    /// Create a new branch ref pointing at an existing commit.
    fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> impl std::future::Future<Output = Result<GitRef>> + Send;

    /// Advance a branch ref to a new commit.
    ///
    /// With `force = false` the server rejects non-fast-forward moves.
    fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> impl std::future::Future<Output = Result<GitRef>> + Send;

    // === Git Database Operations ===

    /// Fetch a commit object.
    fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> impl std::future::Future<Output = Result<CommitObject>> + Send;

    /// Fetch a tree object, one level deep.
    fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> impl std::future::Future<Output = Result<TreeObject>> + Send;

    /// Upload raw content as a blob, returning its content-addressed SHA.
    fn create_blob(
        &self,
        owner: &str,
        repo: &str,
        content: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Create a tree object from a full entry list.
    fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        entries: &[NewTreeEntry],
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Create a commit object without moving any ref.
    fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        commit: &CreateCommit,
    ) -> impl std::future::Future<Output = Result<CommitObject>> + Send;

    // === PR Operations ===

    /// Create a pull request.
    fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pr: &CreatePullRequest,
    ) -> impl std::future::Future<Output = Result<PullRequest>> + Send;

    // === Repository Operations ===

    /// Get the repository's default branch name.
    fn get_default_branch(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl GitHubApi for GitHubClient {
    async fn get_ref(&self, owner: &str, repo: &str, branch: &str) -> Result<GitRef> {
        self.get_ref(owner, repo, branch).await
    }

    async fn create_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<GitRef> {
        self.create_ref(owner, repo, branch, sha).await
    }

    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> Result<GitRef> {
        self.update_ref(owner, repo, branch, sha, force).await
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitObject> {
        self.get_commit(owner, repo, sha).await
    }

    async fn get_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<TreeObject> {
        self.get_tree(owner, repo, sha).await
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &[u8]) -> Result<String> {
        self.create_blob(owner, repo, content).await
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String> {
        self.create_tree(owner, repo, entries).await
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        commit: &CreateCommit,
    ) -> Result<CommitObject> {
        self.create_commit(owner, repo, commit).await
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pr: &CreatePullRequest,
    ) -> Result<PullRequest> {
        self.create_pull(owner, repo, pr).await
    }

    async fn get_default_branch(&self, owner: &str, repo: &str) -> Result<String> {
        self.get_default_branch(owner, repo).await
    }
}
