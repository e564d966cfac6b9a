//! GitHub API types for the git object graph and pull requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named git reference (branch) and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    /// Fully qualified ref name (e.g., `refs/heads/main`).
    pub ref_name: String,

    /// SHA of the commit the ref points at.
    pub sha: String,
}

/// A commit object from the git database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitObject {
    /// Commit SHA.
    pub sha: String,

    /// SHA of the root tree this commit snapshots.
    pub tree_sha: String,

    /// Parent commit SHAs (exactly one for commits Quill creates).
    pub parent_shas: Vec<String>,
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name relative to its parent tree (a single path segment).
    pub path: String,

    /// File mode (e.g., `100644`, `100755`, `040000`).
    pub mode: String,

    /// What the entry's SHA refers to.
    pub kind: TreeEntryKind,

    /// SHA of the referenced blob, tree, or commit.
    pub sha: String,
}

/// Kind of object a [`TreeEntry`] references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEntryKind {
    /// File content.
    Blob,
    /// Nested directory.
    Tree,
    /// Submodule pointer.
    Commit,
}

/// A tree object (one directory snapshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeObject {
    /// Tree SHA.
    pub sha: String,

    /// Entries of this tree, one level deep.
    pub entries: Vec<TreeEntry>,

    /// Whether the API truncated the entry list.
    pub truncated: bool,
}

/// An entry for a tree to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTreeEntry {
    /// Entry name relative to the tree being created.
    pub path: String,

    /// File mode.
    pub mode: String,

    /// Object kind.
    #[serde(rename = "type")]
    pub kind: TreeEntryKind,

    /// SHA of an already-created object.
    pub sha: String,
}

impl NewTreeEntry {
    /// Entry referencing a blob with regular-file mode.
    #[must_use]
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "100644".into(),
            kind: TreeEntryKind::Blob,
            sha: sha.into(),
        }
    }

    /// Entry referencing a nested tree.
    #[must_use]
    pub fn tree(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: "040000".into(),
            kind: TreeEntryKind::Tree,
            sha: sha.into(),
        }
    }
}

/// Author/committer identity for a new commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    /// Author name.
    pub name: String,

    /// Author email.
    pub email: String,

    /// Timestamp; the server fills in "now" when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Request to create a commit object.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCommit {
    /// Commit message.
    pub message: String,

    /// SHA of the root tree.
    pub tree: String,

    /// Parent commit SHAs.
    pub parents: Vec<String>,

    /// Author identity (server default when omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<CommitAuthor>,
}

/// Request to create a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePullRequest {
    /// PR title.
    pub title: String,

    /// PR body.
    pub body: String,

    /// Head branch.
    pub head: String,

    /// Base branch.
    pub base: String,

    /// Whether to create as draft.
    pub draft: bool,
}

/// A GitHub pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number.
    pub number: u64,

    /// PR title.
    pub title: String,

    /// Whether this is a draft PR.
    pub draft: bool,

    /// Head branch name.
    pub head_branch: String,

    /// Base branch name.
    pub base_branch: String,

    /// PR URL.
    pub html_url: String,
}
