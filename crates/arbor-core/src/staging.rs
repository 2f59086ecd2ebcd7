//! Staging area.
//!
//! Records the paths staged for addition (with their blob ids) and the
//! paths staged for removal, relative to the current commit's snapshot.
//! Stored as `.arbor/staging.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ArborError, ArborResult};
use crate::fsutil::atomic_write;
use crate::hash::ObjectId;
use crate::object::{ObjectStore, Tree};

/// What `stage_add` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The content was recorded for addition.
    Staged(ObjectId),
    /// The content matches the current snapshot; any pending entry was dropped.
    Unchanged,
}

/// What `stage_remove` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// The path was tracked, so the removal is staged and the working file
    /// should be deleted.
    pub delete_from_worktree: bool,
}

/// The pending changes for the next commit.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Staging {
    /// Path -> blob id staged for addition.
    pub additions: BTreeMap<String, ObjectId>,
    /// Paths staged for removal.
    pub removals: BTreeSet<String>,
}

impl Staging {
    /// Load the staging area from a JSON file, or return an empty one.
    pub fn load(path: &Path) -> ArborResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the staging area (atomic: temp + fsync + rename).
    pub fn save(&self, path: &Path) -> ArborResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.additions.contains_key(path) || self.removals.contains(path)
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    /// Stage `content` for addition at `path`.
    ///
    /// The blob is written to the store first. Content identical to the
    /// current snapshot's entry leaves nothing staged for the path.
    pub fn stage_add(
        &mut self,
        store: &ObjectStore,
        current: &Tree,
        path: &str,
        content: &[u8],
    ) -> ArborResult<AddOutcome> {
        let blob = store.put_blob(content)?;

        if current.get(path) == Some(&blob) {
            // Re-adding the committed version reverts whatever was pending.
            let was_staged = self.additions.remove(path).is_some() | self.removals.remove(path);
            debug!(path, was_staged, "content matches current commit");
            return Ok(AddOutcome::Unchanged);
        }

        self.removals.remove(path);
        self.additions.insert(path.to_string(), blob.clone());
        debug!(path, blob = %blob.short(), "staged for addition");
        Ok(AddOutcome::Staged(blob))
    }

    /// Stage removal of `path`.
    pub fn stage_remove(&mut self, current: &Tree, path: &str) -> ArborResult<RemoveOutcome> {
        let was_added = self.additions.remove(path).is_some();
        let tracked = current.contains(path);

        if !was_added && !tracked {
            return Err(ArborError::NotTracked(path.to_string()));
        }

        if tracked {
            self.removals.insert(path.to_string());
            debug!(path, "staged for removal");
        } else {
            debug!(path, "unstaged addition");
        }
        Ok(RemoveOutcome {
            delete_from_worktree: tracked,
        })
    }

    /// Apply the staged changes on top of `current`.
    ///
    /// Fails with `NothingToCommit` when the result would equal `current`.
    pub fn build_commit_snapshot(&self, current: &Tree) -> ArborResult<Tree> {
        let snapshot = self.apply(current);
        if snapshot == *current {
            return Err(ArborError::NothingToCommit);
        }
        Ok(snapshot)
    }

    /// Apply the staged changes without requiring any difference.
    pub fn apply(&self, current: &Tree) -> Tree {
        let mut snapshot = current.clone();
        for (path, blob) in &self.additions {
            snapshot.insert(path, blob.clone());
        }
        for path in &self.removals {
            snapshot.remove(path);
        }
        snapshot
    }
}
