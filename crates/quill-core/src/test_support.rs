//! In-memory fakes for exercising services and the dispatch loop.
//!
//! `MockGitHub` is a content-addressed fake object store behind the
//! [`GitHubApi`] trait: blobs, trees, and commits get deterministic ids, so
//! tree-identity properties can be asserted directly. Interior mutability is
//! a `Mutex` (not `RefCell`) because the trait requires `Send` futures.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use quill_github::{
    CommitObject, CreateCommit, CreatePullRequest, Error as GhError, GitHubApi, GitRef,
    NewTreeEntry, PullRequest, Result as GhResult, TreeEntry, TreeObject,
};

use crate::engine::{Decision, DecisionEngine, EngineContext, EngineError};

#[derive(Clone)]
struct StoredCommit {
    tree: String,
    parents: Vec<String>,
    message: String,
}

#[derive(Default)]
struct Store {
    refs: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, Vec<NewTreeEntry>>,
    commits: HashMap<String, StoredCommit>,
    pulls: Vec<PullRequest>,
    /// Ref moves applied on the next `create_commit` call, simulating a
    /// concurrent writer landing between a state read and the ref update.
    staged_moves: Vec<(String, String)>,
    default_branch: String,
}

/// Deterministic fake object id (`DefaultHasher` uses fixed keys).
fn object_id(kind: &str, payload: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    payload.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn tree_id(entries: &[NewTreeEntry]) -> String {
    let mut payload = String::new();
    for entry in entries {
        payload.push_str(&format!(
            "{} {} {:?} {}\n",
            entry.path, entry.mode, entry.kind, entry.sha
        ));
    }
    object_id("tree", payload.as_bytes())
}

fn commit_id(commit: &StoredCommit) -> String {
    let payload = format!(
        "{}\n{}\n{}",
        commit.tree,
        commit.parents.join(","),
        commit.message
    );
    object_id("commit", payload.as_bytes())
}

/// In-memory `GitHubApi` implementation.
pub(crate) struct MockGitHub {
    store: Mutex<Store>,
}

impl MockGitHub {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                default_branch: "main".into(),
                ..Store::default()
            }),
        }
    }

    /// Seed a branch whose root commit contains the given files.
    pub fn with_branch(self, branch: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut store = self.store.lock().unwrap();
            let owned: Vec<(String, Vec<u8>)> = files
                .iter()
                .map(|(path, content)| ((*path).to_string(), content.as_bytes().to_vec()))
                .collect();
            let tree = insert_tree(&mut store, &owned);
            let commit = StoredCommit {
                tree,
                parents: vec![],
                message: "initial commit".into(),
            };
            let sha = commit_id(&commit);
            store.commits.insert(sha.clone(), commit);
            store.refs.insert(branch.to_string(), sha);
        }
        self
    }

    /// Create a commit on top of a branch's head without moving any ref.
    /// Pair with [`Self::stage_ref_move`] to simulate a concurrent writer.
    pub fn seed_commit(&self, branch: &str) -> String {
        let mut store = self.store.lock().unwrap();
        let parent = store.refs.get(branch).unwrap().clone();
        let tree = store.commits.get(&parent).unwrap().tree.clone();
        let commit = StoredCommit {
            tree,
            parents: vec![parent],
            message: "concurrent change".into(),
        };
        let sha = commit_id(&commit);
        store.commits.insert(sha.clone(), commit);
        sha
    }

    /// Create a commit with an arbitrary parent (for non-fast-forward cases).
    pub fn seed_commit_with_parent(&self, parent: &str) -> String {
        let mut store = self.store.lock().unwrap();
        let commit = StoredCommit {
            tree: "unreferenced-tree".into(),
            parents: vec![parent.to_string()],
            message: "orphan change".into(),
        };
        let sha = commit_id(&commit);
        store.commits.insert(sha.clone(), commit);
        sha
    }

    /// Move a ref right before the next commit object is created.
    pub fn stage_ref_move(&self, branch: &str, sha: &str) {
        self.store
            .lock()
            .unwrap()
            .staged_moves
            .push((branch.to_string(), sha.to_string()));
    }

    pub fn ref_sha(&self, branch: &str) -> Option<String> {
        self.store.lock().unwrap().refs.get(branch).cloned()
    }

    pub fn blob_content(&self, sha: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().blobs.get(sha).cloned()
    }

    pub fn tree_entries(&self, sha: &str) -> Option<Vec<NewTreeEntry>> {
        self.store.lock().unwrap().trees.get(sha).cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<(String, Vec<String>)> {
        self.store
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .map(|c| (c.tree.clone(), c.parents.clone()))
    }

    pub fn pull_count(&self) -> usize {
        self.store.lock().unwrap().pulls.len()
    }
}

/// Recursively insert a nested tree built from flat `(path, content)` pairs.
fn insert_tree(store: &mut Store, files: &[(String, Vec<u8>)]) -> String {
    let mut entries: Vec<NewTreeEntry> = Vec::new();
    let mut subdirs: BTreeMap<String, Vec<(String, Vec<u8>)>> = BTreeMap::new();

    for (path, content) in files {
        match path.split_once('/') {
            None => {
                let sha = object_id("blob", content);
                store.blobs.insert(sha.clone(), content.clone());
                entries.push(NewTreeEntry::blob(path.clone(), sha));
            }
            Some((dir, rest)) => {
                subdirs
                    .entry(dir.to_string())
                    .or_default()
                    .push((rest.to_string(), content.clone()));
            }
        }
    }

    for (dir, nested) in subdirs {
        let sha = insert_tree(store, &nested);
        entries.push(NewTreeEntry::tree(dir, sha));
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let sha = tree_id(&entries);
    store.trees.insert(sha.clone(), entries);
    sha
}

impl GitHubApi for MockGitHub {
    async fn get_ref(&self, _owner: &str, _repo: &str, branch: &str) -> GhResult<GitRef> {
        let store = self.store.lock().unwrap();
        store.refs.get(branch).map_or_else(
            || Err(GhError::NotFound(format!("branch '{branch}'"))),
            |sha| {
                Ok(GitRef {
                    ref_name: format!("refs/heads/{branch}"),
                    sha: sha.clone(),
                })
            },
        )
    }

    async fn create_ref(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
        sha: &str,
    ) -> GhResult<GitRef> {
        let mut store = self.store.lock().unwrap();
        if store.refs.contains_key(branch) {
            return Err(GhError::ReferenceExists("Reference already exists".into()));
        }
        if !store.commits.contains_key(sha) {
            return Err(GhError::NotFound("Object does not exist".into()));
        }
        store.refs.insert(branch.to_string(), sha.to_string());
        Ok(GitRef {
            ref_name: format!("refs/heads/{branch}"),
            sha: sha.to_string(),
        })
    }

    async fn update_ref(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> GhResult<GitRef> {
        let mut store = self.store.lock().unwrap();
        let Some(current) = store.refs.get(branch).cloned() else {
            return Err(GhError::NotFound(format!("branch '{branch}'")));
        };
        let Some(commit) = store.commits.get(sha) else {
            return Err(GhError::NotFound("Object does not exist".into()));
        };
        if !force && !commit.parents.contains(&current) {
            return Err(GhError::NotFastForward(
                "Update is not a fast forward".into(),
            ));
        }
        store.refs.insert(branch.to_string(), sha.to_string());
        Ok(GitRef {
            ref_name: format!("refs/heads/{branch}"),
            sha: sha.to_string(),
        })
    }

    async fn get_commit(&self, _owner: &str, _repo: &str, sha: &str) -> GhResult<CommitObject> {
        let store = self.store.lock().unwrap();
        store.commits.get(sha).map_or_else(
            || Err(GhError::NotFound(format!("commit '{sha}'"))),
            |commit| {
                Ok(CommitObject {
                    sha: sha.to_string(),
                    tree_sha: commit.tree.clone(),
                    parent_shas: commit.parents.clone(),
                })
            },
        )
    }

    async fn get_tree(&self, _owner: &str, _repo: &str, sha: &str) -> GhResult<TreeObject> {
        let store = self.store.lock().unwrap();
        store.trees.get(sha).map_or_else(
            || Err(GhError::NotFound(format!("tree '{sha}'"))),
            |entries| {
                Ok(TreeObject {
                    sha: sha.to_string(),
                    entries: entries
                        .iter()
                        .map(|e| TreeEntry {
                            path: e.path.clone(),
                            mode: e.mode.clone(),
                            kind: e.kind,
                            sha: e.sha.clone(),
                        })
                        .collect(),
                    truncated: false,
                })
            },
        )
    }

    async fn create_blob(&self, _owner: &str, _repo: &str, content: &[u8]) -> GhResult<String> {
        let mut store = self.store.lock().unwrap();
        let sha = object_id("blob", content);
        store.blobs.insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    async fn create_tree(
        &self,
        _owner: &str,
        _repo: &str,
        entries: &[NewTreeEntry],
    ) -> GhResult<String> {
        let mut store = self.store.lock().unwrap();
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        let sha = tree_id(&sorted);
        store.trees.insert(sha.clone(), sorted);
        Ok(sha)
    }

    async fn create_commit(
        &self,
        _owner: &str,
        _repo: &str,
        commit: &CreateCommit,
    ) -> GhResult<CommitObject> {
        let mut store = self.store.lock().unwrap();

        // A staged concurrent writer lands now, after the caller read state
        // and built its objects, but before the ref update.
        let moves: Vec<(String, String)> = store.staged_moves.drain(..).collect();
        for (branch, sha) in moves {
            store.refs.insert(branch, sha);
        }

        let stored = StoredCommit {
            tree: commit.tree.clone(),
            parents: commit.parents.clone(),
            message: commit.message.clone(),
        };
        let sha = commit_id(&stored);
        store.commits.insert(sha.clone(), stored);
        Ok(CommitObject {
            sha,
            tree_sha: commit.tree.clone(),
            parent_shas: commit.parents.clone(),
        })
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pr: &CreatePullRequest,
    ) -> GhResult<PullRequest> {
        let mut store = self.store.lock().unwrap();
        let Some(head_sha) = store.refs.get(&pr.head).cloned() else {
            return Err(GhError::NotFound(format!("branch '{}'", pr.head)));
        };
        let Some(base_sha) = store.refs.get(&pr.base).cloned() else {
            return Err(GhError::NotFound(format!("branch '{}'", pr.base)));
        };
        if head_sha == base_sha {
            return Err(GhError::Unprocessable {
                message: format!("No commits between {} and {}", pr.base, pr.head),
            });
        }

        let number = store.pulls.len() as u64 + 1;
        let pull = PullRequest {
            number,
            title: pr.title.clone(),
            draft: pr.draft,
            head_branch: pr.head.clone(),
            base_branch: pr.base.clone(),
            html_url: format!("https://github.com/{owner}/{repo}/pull/{number}"),
        };
        store.pulls.push(pull.clone());
        Ok(pull)
    }

    async fn get_default_branch(&self, _owner: &str, _repo: &str) -> GhResult<String> {
        Ok(self.store.lock().unwrap().default_branch.clone())
    }
}

/// Engine returning scripted replies, then `finish`.
pub(crate) struct ScriptedEngine {
    replies: Mutex<VecDeque<Result<Decision, EngineError>>>,
    repeat: Option<Decision>,
    calls: AtomicU32,
}

impl ScriptedEngine {
    /// Scripted decisions in order; once exhausted, every call finishes.
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            replies: Mutex::new(decisions.into_iter().map(Ok).collect()),
            repeat: None,
            calls: AtomicU32::new(0),
        }
    }

    /// An engine that returns the same decision forever.
    pub fn repeating(decision: Decision) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(decision),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue engine errors after any scripted decisions.
    pub fn with_errors(self, errors: Vec<EngineError>) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            for error in errors {
                replies.push_back(Err(error));
            }
        }
        self
    }

    /// How many times the loop asked for a decision.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl DecisionEngine for ScriptedEngine {
    async fn decide(&self, _ctx: &EngineContext<'_>) -> Result<Decision, EngineError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(decision) = &self.repeat {
            return Ok(decision.clone());
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Decision::Finish))
    }
}
