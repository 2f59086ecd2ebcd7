//! Three-way merge of snapshots.
//!
//! Merging works at file granularity: each path in the union of the base,
//! current and given snapshots is classified by comparing blob ids. A path
//! both sides changed in different ways is a conflict; the core exposes the
//! blob ids of every side and leaves rendering to the working-tree layer.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ArborResult;
use crate::fsutil::{atomic_write, remove_if_exists};
use crate::hash::ObjectId;
use crate::object::Tree;

/// What happens to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    /// Current side already holds the merged result.
    Keep,
    /// Take the given side's blob.
    Take(ObjectId),
    /// The given side deleted a path current left untouched.
    Delete,
    /// Both sides changed the path differently.
    Conflict,
}

/// A path both sides changed differently. `None` means absent on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileConflict {
    pub path: String,
    pub base: Option<ObjectId>,
    pub current: Option<ObjectId>,
    pub given: Option<ObjectId>,
}

/// Every per-path decision of a merge.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    /// Current snapshot with all non-conflicting decisions applied.
    pub merged: Tree,
    /// Paths whose content comes from the given side.
    pub take: Vec<(String, ObjectId)>,
    /// Paths deleted by the given side.
    pub delete: Vec<String>,
    /// Paths that need resolution.
    pub conflicts: Vec<FileConflict>,
}

impl MergePlan {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Classify one path from its blob ids in the base, current and given snapshots.
pub fn classify(
    base: Option<&ObjectId>,
    current: Option<&ObjectId>,
    given: Option<&ObjectId>,
) -> PathDecision {
    if current == given {
        // Unchanged, identical edits, identical additions, or both deleted.
        return PathDecision::Keep;
    }
    if base == current {
        return match given {
            Some(blob) => PathDecision::Take(blob.clone()),
            None => PathDecision::Delete,
        };
    }
    if base == given {
        return PathDecision::Keep;
    }
    PathDecision::Conflict
}

/// Plan the merge of `given` into `current` with `base` as merge base.
pub fn plan(base: &Tree, current: &Tree, given: &Tree) -> MergePlan {
    let paths: BTreeSet<&String> = base
        .entries
        .keys()
        .chain(current.entries.keys())
        .chain(given.entries.keys())
        .collect();

    let mut out = MergePlan {
        merged: current.clone(),
        ..MergePlan::default()
    };

    for path in paths {
        let (b, c, g) = (base.get(path), current.get(path), given.get(path));
        match classify(b, c, g) {
            PathDecision::Keep => {}
            PathDecision::Take(blob) => {
                out.merged.insert(path, blob.clone());
                out.take.push((path.clone(), blob));
            }
            PathDecision::Delete => {
                out.merged.remove(path);
                out.delete.push(path.clone());
            }
            PathDecision::Conflict => out.conflicts.push(FileConflict {
                path: path.clone(),
                base: b.cloned(),
                current: c.cloned(),
                given: g.cloned(),
            }),
        }
    }

    out
}

/// Terminal state of a merge that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum MergeOutcome {
    /// The current branch moved to the given tip; no commit was created.
    FastForward { commit: ObjectId },
    /// A two-parent merge commit was created.
    Committed { commit: ObjectId },
    /// Conflict markers were written; nothing was committed.
    Conflicted { conflicts: Vec<String> },
}

impl MergeOutcome {
    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted { .. })
    }
}

/// A conflicted merge waiting for resolution, stored at `.arbor/MERGE_HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingMerge {
    /// Tip that becomes the second parent of the resolving commit.
    pub given: ObjectId,
    /// Name of the merged-in branch.
    pub given_branch: String,
    /// Message suggested for the resolving commit.
    pub message: String,
    /// Paths that were left with conflict markers.
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl PendingMerge {
    pub fn load(path: &Path) -> ArborResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, path: &Path) -> ArborResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    pub fn clear(path: &Path) -> ArborResult<()> {
        remove_if_exists(path)
    }
}
