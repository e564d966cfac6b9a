//! Atomic multi-file tree construction.
//!
//! A change set is first loaded into a path-segment trie, then every
//! directory the trie touches is rebuilt against its base tree: top-down to
//! resolve existing sub-trees, bottom-up to create the replacement trees.
//! All files in the change set land in exactly one resulting root tree, so
//! the commit built from it is atomic - there is no intermediate state where
//! only some of the files are present.

use std::collections::BTreeMap;

use quill_github::{GitHubApi, NewTreeEntry, TreeEntryKind};
use tracing::debug;

use crate::changeset::{Change, ChangeSet};
use crate::error::{Error, Result};
use crate::workspace::RepoId;

/// A trie of pending changes keyed by path segment.
#[derive(Debug, Default)]
struct ChangeNode {
    /// Leaf operation at this exact path, if any.
    op: Option<LeafOp>,
    /// Changes nested below this path.
    children: BTreeMap<String, ChangeNode>,
}

#[derive(Debug)]
enum LeafOp {
    Write(Vec<u8>),
    Delete,
}

/// Load a change set into a trie.
///
/// Rejects change sets that use one path both as a file and as a directory;
/// such a set cannot be applied as a single tree.
fn build_trie(changes: &ChangeSet) -> Result<ChangeNode> {
    let mut root = ChangeNode::default();

    for (path, change) in changes.iter() {
        let segments: Vec<&str> = path.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            continue; // TreePath guarantees at least one segment
        };

        let mut node = &mut root;
        for segment in parents {
            node = node.children.entry((*segment).to_string()).or_default();
            if node.op.is_some() {
                return Err(Error::InvalidPath {
                    path: path.as_str().to_string(),
                    reason: "path traverses a segment the change set treats as a file".into(),
                });
            }
        }

        let leaf = node.children.entry((*last).to_string()).or_default();
        if !leaf.children.is_empty() {
            return Err(Error::InvalidPath {
                path: path.as_str().to_string(),
                reason: "path is used as a directory elsewhere in the change set".into(),
            });
        }
        leaf.op = Some(match change {
            Change::Write(bytes) => LeafOp::Write(bytes.clone()),
            Change::Delete => LeafOp::Delete,
        });
    }

    Ok(root)
}

/// One directory to rebuild, discovered while walking the change trie.
#[derive(Default)]
struct DirFrame {
    /// Full path of the directory (empty for the root), for diagnostics.
    path: String,
    /// Entries of the corresponding base tree, keyed by name.
    base: BTreeMap<String, NewTreeEntry>,
    /// Leaf operations to apply at this level.
    ops: Vec<(String, LeafOp)>,
    /// Child directories as (entry name, frame index) pairs.
    subdirs: Vec<(String, usize)>,
}

/// Apply `changes` on top of `base_tree` and return the id of the merged
/// root tree, or `None` when the result is empty.
///
/// Identical change sets over an identical base always produce identical
/// `create_tree` payloads (entries stay name-ordered), so the resulting tree
/// ids are stable regardless of change submission order.
pub(crate) async fn build_merged_tree<H: GitHubApi>(
    github: &H,
    repo: &RepoId,
    base_tree: Option<&str>,
    changes: &ChangeSet,
) -> Result<Option<String>> {
    let root = build_trie(changes)?;

    // Phase 1: top-down. Flatten the trie into directory frames, resolving
    // each touched directory's base tree as it is discovered. Frames are
    // created parent-first, so an index is always greater than its parent's.
    let mut frames: Vec<DirFrame> = vec![DirFrame::default()];
    let mut work: Vec<(usize, Option<String>, ChangeNode)> =
        vec![(0, base_tree.map(str::to_string), root)];

    while let Some((index, base_sha, node)) = work.pop() {
        if let Some(sha) = base_sha {
            let tree = github.get_tree(&repo.owner, &repo.name, &sha).await?;
            if tree.truncated {
                return Err(Error::RemoteRejected(format!(
                    "tree {sha} was truncated by the API; the directory is too large to merge"
                )));
            }
            frames[index].base = tree
                .entries
                .into_iter()
                .map(|e| {
                    (
                        e.path.clone(),
                        NewTreeEntry {
                            path: e.path,
                            mode: e.mode,
                            kind: e.kind,
                            sha: e.sha,
                        },
                    )
                })
                .collect();
        }

        for (name, mut child) in node.children {
            if let Some(op) = child.op.take() {
                frames[index].ops.push((name, op));
                continue;
            }

            let child_path = if frames[index].path.is_empty() {
                name.clone()
            } else {
                format!("{}/{name}", frames[index].path)
            };
            let child_base = match frames[index].base.get(&name) {
                Some(entry) if entry.kind == TreeEntryKind::Tree => Some(entry.sha.clone()),
                Some(_) => {
                    return Err(Error::InvalidPath {
                        path: child_path,
                        reason: "path traverses a non-directory entry".into(),
                    });
                }
                None => None,
            };

            let child_index = frames.len();
            frames.push(DirFrame {
                path: child_path,
                ..DirFrame::default()
            });
            frames[index].subdirs.push((name, child_index));
            work.push((child_index, child_base, child));
        }
    }

    debug!(directories = frames.len(), "resolved change trie");

    // Phase 2: bottom-up. Reverse index order visits every child before its
    // parent, so rebuilt sub-tree ids are ready when the parent needs them.
    let mut built: Vec<Option<String>> = vec![None; frames.len()];
    for index in (0..frames.len()).rev() {
        let frame = std::mem::take(&mut frames[index]);
        let mut entries = frame.base;

        for (name, op) in frame.ops {
            match op {
                LeafOp::Write(content) => {
                    let sha = github.create_blob(&repo.owner, &repo.name, &content).await?;
                    // Overwrites keep the existing mode, so executable bits
                    // survive an edit; new files are plain 100644.
                    let mode = match entries.get(&name) {
                        Some(existing) if existing.kind == TreeEntryKind::Blob => {
                            existing.mode.clone()
                        }
                        _ => "100644".to_string(),
                    };
                    entries.insert(
                        name.clone(),
                        NewTreeEntry {
                            path: name,
                            mode,
                            kind: TreeEntryKind::Blob,
                            sha,
                        },
                    );
                }
                LeafOp::Delete => {
                    // Deleting an absent entry is a no-op.
                    entries.remove(&name);
                }
            }
        }

        for (name, child_index) in frame.subdirs {
            match built[child_index].take() {
                Some(sha) => {
                    entries.insert(name.clone(), NewTreeEntry::tree(name, sha));
                }
                // A directory that ended up empty is omitted entirely.
                None => {
                    entries.remove(&name);
                }
            }
        }

        if entries.is_empty() {
            continue;
        }
        let list: Vec<NewTreeEntry> = entries.into_values().collect();
        built[index] = Some(github.create_tree(&repo.owner, &repo.name, &list).await?);
    }

    Ok(built.into_iter().next().flatten())
}
