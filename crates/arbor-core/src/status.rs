//! Working directory status.
//!
//! Compares the working tree against the current commit's snapshot and
//! the staging area to find unstaged modifications and untracked files.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ArborResult;
use crate::object::{Object, Tree};
use crate::refs::Head;
use crate::staging::Staging;
use crate::worktree::WorkTree;

/// Kind of unstaged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Content differs from what is tracked or staged.
    Modified,
    /// Tracked or staged, but gone from disk.
    Deleted,
}

/// A working file whose state is not reflected in the staging area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnstagedChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// Full repository status.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub head: Head,
    /// All branch names, sorted.
    pub branches: Vec<String>,
    /// Paths staged for addition.
    pub staged: Vec<String>,
    /// Paths staged for removal.
    pub removed: Vec<String>,
    /// Modifications not staged for commit.
    pub unstaged: Vec<UnstagedChange>,
    /// Files present on disk that are neither tracked nor staged.
    pub untracked: Vec<String>,
    /// Branch being merged, when a conflicted merge is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merging: Option<String>,
}

impl Status {
    /// True if nothing is staged, modified or untracked.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }

    /// One-line summary.
    pub fn brief(&self) -> String {
        let position = match &self.head {
            Head::Attached(name) => name.clone(),
            Head::Detached(id) => format!("detached@{}", id.short()),
        };
        if self.is_clean() {
            return format!("{position} clean");
        }
        format!(
            "{position} staged:{} removed:{} unstaged:{} untracked:{}",
            self.staged.len(),
            self.removed.len(),
            self.unstaged.len(),
            self.untracked.len()
        )
    }
}

/// Compute unstaged changes and untracked files.
pub fn working_changes(
    current: &Tree,
    staging: &Staging,
    worktree: &dyn WorkTree,
) -> ArborResult<(Vec<UnstagedChange>, Vec<String>)> {
    let on_disk: BTreeSet<String> = worktree.list_candidates()?.into_iter().collect();
    let mut unstaged = Vec::new();
    let mut untracked = Vec::new();

    let expected = staging.apply(current);
    for (path, blob) in &expected.entries {
        // Tracked files may still match an ignore rule.
        let kind = match worktree.read_file(path)? {
            Some(content) if Object::blob_id(&content)? == *blob => continue,
            Some(_) => ChangeKind::Modified,
            None => ChangeKind::Deleted,
        };
        unstaged.push(UnstagedChange {
            path: path.clone(),
            kind,
        });
    }

    for path in on_disk {
        if !expected.contains(&path) {
            untracked.push(path);
        }
    }

    Ok((unstaged, untracked))
}
