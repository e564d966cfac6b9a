//! Repository mutation service.
//!
//! [`RepoWorkspace`] bundles the operations the dispatch loop executes:
//! reading branch state, creating branches, committing a change set
//! atomically, and opening pull requests. It is generic over [`GitHubApi`]
//! so tests can drive it against an in-memory fake.

use std::fmt;
use std::str::FromStr;

use quill_github::{CommitAuthor, CreateCommit, CreatePullRequest, GitHubApi, GitRef, PullRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::branch_name::BranchName;
use crate::changeset::ChangeSet;
use crate::error::{Error, Result};
use crate::tree::build_merged_tree;

/// Immutable identity of the repository all operations target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoId {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoId {
    /// Create a repository id from owner and name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::InvalidState(format!(
                "repository must be given as 'owner/name', got '{s}'"
            ))),
        }
    }
}

/// A branch's position read at the start of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    /// Branch name.
    pub branch: String,
    /// Commit the branch ref pointed at.
    pub head_sha: String,
    /// Root tree of that commit.
    pub tree_sha: String,
}

/// Result of one atomic multi-file commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Branch the commit landed on.
    pub branch: String,
    /// The new commit.
    pub commit_sha: String,
    /// The new commit's root tree.
    pub tree_sha: String,
}

/// Service executing repository mutations against an injected API client.
pub struct RepoWorkspace<'a, H: GitHubApi> {
    github: &'a H,
    repo: RepoId,
}

impl<'a, H: GitHubApi> RepoWorkspace<'a, H> {
    /// Create a workspace over one repository.
    pub const fn new(github: &'a H, repo: RepoId) -> Self {
        Self { github, repo }
    }

    /// The repository this workspace targets.
    #[must_use]
    pub const fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Resolve a branch to its current head commit and root tree.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the branch does not exist.
    pub async fn branch_state(&self, branch: &BranchName) -> Result<BranchState> {
        let git_ref = self
            .github
            .get_ref(&self.repo.owner, &self.repo.name, branch.as_str())
            .await?;
        let commit = self
            .github
            .get_commit(&self.repo.owner, &self.repo.name, &git_ref.sha)
            .await?;

        Ok(BranchState {
            branch: branch.to_string(),
            head_sha: commit.sha,
            tree_sha: commit.tree_sha,
        })
    }

    /// Create a new branch pointing at an existing commit.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyExists`] on a name collision and
    /// [`Error::NotFound`] when the source commit is missing.
    pub async fn create_branch(&self, name: &BranchName, source_sha: &str) -> Result<GitRef> {
        let created = self
            .github
            .create_ref(&self.repo.owner, &self.repo.name, name.as_str(), source_sha)
            .await?;

        info!(branch = %name, sha = %created.sha, "created branch");
        Ok(created)
    }

    /// Commit a change set to a branch as one atomic commit.
    ///
    /// Reads the branch state, merges the change set into a single new root
    /// tree, creates one commit whose parent is the head read at the start,
    /// and advances the ref with an optimistic concurrency check. On
    /// [`Error::Conflict`] the whole operation must be redone against fresh
    /// state; the orphaned blob and tree objects are inert.
    ///
    /// # Errors
    /// `InvalidState` for an empty change set or one that empties the
    /// repository root, `NotFound` for a missing branch, `InvalidPath` for
    /// unusable change paths, `Conflict` when the branch moved concurrently.
    pub async fn commit_changes(
        &self,
        branch: &BranchName,
        message: &str,
        author: Option<&CommitAuthor>,
        changes: &ChangeSet,
    ) -> Result<CommitOutcome> {
        if changes.is_empty() {
            return Err(Error::InvalidState("change set is empty".into()));
        }

        let start = self.branch_state(branch).await?;
        info!(
            branch = %branch,
            base = %start.head_sha,
            changes = changes.len(),
            "building atomic commit"
        );

        let new_tree =
            build_merged_tree(self.github, &self.repo, Some(&start.tree_sha), changes).await?;
        let new_tree = new_tree.ok_or_else(|| {
            Error::InvalidState("change set would empty the repository root".into())
        })?;
        debug!(tree = %new_tree, "merged tree created");

        let commit = self
            .github
            .create_commit(
                &self.repo.owner,
                &self.repo.name,
                &CreateCommit {
                    message: message.to_string(),
                    tree: new_tree,
                    parents: vec![start.head_sha.clone()],
                    author: author.cloned(),
                },
            )
            .await?;

        self.update_branch(branch, &start.head_sha, &commit.sha)
            .await?;

        info!(branch = %branch, commit = %commit.sha, "commit landed");
        Ok(CommitOutcome {
            branch: branch.to_string(),
            commit_sha: commit.sha,
            tree_sha: commit.tree_sha,
        })
    }

    /// Advance a branch from an expected commit to a new one.
    ///
    /// The update happens only if the branch still points at `expected`;
    /// otherwise another writer advanced it and the caller must re-read
    /// state and rebuild, since its tree and commit were built against a
    /// now-stale base.
    ///
    /// # Errors
    /// Returns [`Error::Conflict`] when the branch no longer points at
    /// `expected` or the server rejects the move as a non-fast-forward.
    pub async fn update_branch(
        &self,
        branch: &BranchName,
        expected: &str,
        new_sha: &str,
    ) -> Result<()> {
        let live = self
            .github
            .get_ref(&self.repo.owner, &self.repo.name, branch.as_str())
            .await?;
        if live.sha != expected {
            return Err(Error::Conflict(format!(
                "branch '{branch}' moved from {expected} to {}",
                live.sha
            )));
        }

        self.github
            .update_ref(
                &self.repo.owner,
                &self.repo.name,
                branch.as_str(),
                new_sha,
                false,
            )
            .await?;
        Ok(())
    }

    /// Open a pull request from `head` into `base`.
    ///
    /// Title and body pass through verbatim.
    ///
    /// # Errors
    /// Returns [`Error::InvalidState`] when head and base are identical or
    /// head has no commits ahead of base.
    pub async fn open_pull_request(
        &self,
        head: &BranchName,
        base: &BranchName,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequest> {
        if head == base {
            return Err(Error::InvalidState(
                "head and base branches are identical".into(),
            ));
        }

        let pr = self
            .github
            .create_pull(
                &self.repo.owner,
                &self.repo.name,
                &CreatePullRequest {
                    title: title.to_string(),
                    body: body.to_string(),
                    head: head.to_string(),
                    base: base.to_string(),
                    draft,
                },
            )
            .await?;

        info!(number = pr.number, url = %pr.html_url, "opened pull request");
        Ok(pr)
    }

    /// The repository's default branch.
    ///
    /// # Errors
    /// Returns error if the repository is inaccessible.
    pub async fn default_branch(&self) -> Result<String> {
        Ok(self
            .github
            .get_default_branch(&self.repo.owner, &self.repo.name)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::path::TreePath;
    use crate::test_support::MockGitHub;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn workspace(github: &MockGitHub) -> RepoWorkspace<'_, MockGitHub> {
        RepoWorkspace::new(github, RepoId::new("owner", "repo"))
    }

    #[test]
    fn test_repo_id_parsing() {
        let repo: RepoId = "huggingface/transformers".parse().unwrap();
        assert_eq!(repo.owner, "huggingface");
        assert_eq!(repo.name, "transformers");
        assert_eq!(repo.to_string(), "huggingface/transformers");

        assert!("no-slash".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
        assert!("/name".parse::<RepoId>().is_err());
        assert!("owner/".parse::<RepoId>().is_err());
    }

    #[tokio::test]
    async fn test_branch_state_reads_head_and_tree() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);

        let state = ws.branch_state(&branch("main")).await.unwrap();
        assert_eq!(state.branch, "main");
        assert_eq!(state.head_sha, github.ref_sha("main").unwrap());
        assert!(!state.tree_sha.is_empty());
    }

    #[tokio::test]
    async fn test_branch_state_not_found() {
        let github = MockGitHub::new();
        let ws = workspace(&github);

        let err = ws.branch_state(&branch("missing")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_branch_and_collision() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);
        let main = ws.branch_state(&branch("main")).await.unwrap();

        let created = ws
            .create_branch(&branch("feature-branch"), &main.head_sha)
            .await
            .unwrap();
        assert_eq!(created.sha, main.head_sha);
        assert_eq!(
            github.ref_sha("feature-branch").unwrap(),
            github.ref_sha("main").unwrap()
        );

        let err = ws
            .create_branch(&branch("feature-branch"), &main.head_sha)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_create_branch_from_missing_commit() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);

        let err = ws
            .create_branch(&branch("feature-branch"), "0000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_commit_changes_lands_atomically() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);
        let before = ws.branch_state(&branch("main")).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.write(TreePath::new("a.txt").unwrap(), "alpha");
        changes.write(TreePath::new("b/c.txt").unwrap(), "gamma");

        let outcome = ws
            .commit_changes(&branch("main"), "add files", None, &changes)
            .await
            .unwrap();

        // Ref advanced to the new commit, whose parent is the old head.
        assert_eq!(github.ref_sha("main").unwrap(), outcome.commit_sha);
        let (tree, parents) = github.commit(&outcome.commit_sha).unwrap();
        assert_eq!(tree, outcome.tree_sha);
        assert_eq!(parents, vec![before.head_sha]);

        // Both files are present in the single resulting tree.
        let entries = github.tree_entries(&outcome.tree_sha).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["README.md", "a.txt", "b"]);
    }

    #[tokio::test]
    async fn test_commit_changes_rejects_empty_set() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);

        let err = ws
            .commit_changes(&branch("main"), "noop", None, &ChangeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_commit_changes_conflict_on_concurrent_advance() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);

        // A concurrent writer lands on main between our state read and the
        // ref update (the mock applies it when the commit object is created).
        let rival = github.seed_commit("main");
        github.stage_ref_move("main", &rival);

        let mut changes = ChangeSet::new();
        changes.write(TreePath::new("a.txt").unwrap(), "alpha");

        let err = ws
            .commit_changes(&branch("main"), "add file", None, &changes)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // The rival commit survived; ours was never installed.
        assert_eq!(github.ref_sha("main").unwrap(), rival);
    }

    #[tokio::test]
    async fn test_update_branch_rejects_non_fast_forward() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);
        let main = ws.branch_state(&branch("main")).await.unwrap();

        // A commit that is not a child of main's head: the expected check
        // passes but the server-side fast-forward check must still fire.
        let orphan = github.seed_commit_with_parent("0000deadbeef");

        let err = ws
            .update_branch(&branch("main"), &main.head_sha, &orphan)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_open_pull_request_rejects_identical_branches() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);

        let err = ws
            .open_pull_request(&branch("main"), &branch("main"), "t", "b", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_open_pull_request_rejects_branch_with_no_commits_ahead() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);
        let main = ws.branch_state(&branch("main")).await.unwrap();
        ws.create_branch(&branch("feature-branch"), &main.head_sha)
            .await
            .unwrap();

        let err = ws
            .open_pull_request(
                &branch("feature-branch"),
                &branch("main"),
                "Empty",
                "",
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_open_pull_request_success() {
        let github = MockGitHub::new().with_branch("main", &[("README.md", "hello")]);
        let ws = workspace(&github);
        let main = ws.branch_state(&branch("main")).await.unwrap();
        ws.create_branch(&branch("feature-branch"), &main.head_sha)
            .await
            .unwrap();

        let mut changes = ChangeSet::new();
        changes.write(TreePath::new("docs/ko/intro.md").unwrap(), "translated");
        ws.commit_changes(&branch("feature-branch"), "docs: translate intro", None, &changes)
            .await
            .unwrap();

        let pr = ws
            .open_pull_request(
                &branch("feature-branch"),
                &branch("main"),
                "Translate intro to Korean",
                "Adds the translated page.",
                false,
            )
            .await
            .unwrap();

        assert_eq!(pr.number, 1);
        assert_eq!(pr.head_branch, "feature-branch");
        assert_eq!(pr.base_branch, "main");
    }
}
