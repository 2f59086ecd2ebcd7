//! Repository: the main entry point for arbor operations.
//!
//! A Repository ties together the object store, commit graph, staging
//! area, reference table and working tree into one context object. Every
//! mutating operation holds the repository lock for its whole duration,
//! writes objects before references, and saves state files atomically.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit::Commit;
use crate::config::RepoConfig;
use crate::error::{ArborError, ArborResult};
use crate::graph::CommitGraph;
use crate::hash::{ObjectId, ID_HEX_LEN};
use crate::lock::RepoLock;
use crate::merge::{self, MergeOutcome, PendingMerge};
use crate::object::{Object, ObjectStore, Tree};
use crate::refs::{Head, RefTable};
use crate::staging::{AddOutcome, RemoveOutcome, Staging};
use crate::status::{self, Status};
use crate::worktree::{conflict_markers, normalize_path, FsWorkTree, WorkTree, ARBOR_DIR};

const STAGING_FILE: &str = "staging.json";
const CONFIG_FILE: &str = "config.json";
const MERGE_HEAD_FILE: &str = "MERGE_HEAD";

/// Shortest accepted commit id prefix.
const MIN_PREFIX_LEN: usize = 4;

/// A commit together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: ObjectId,
    #[serde(flatten)]
    pub commit: Commit,
}

/// Files touched while switching the working tree to another snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    /// Commit now checked out.
    pub commit: Option<ObjectId>,
    /// Files created or overwritten.
    pub written: Vec<String>,
    /// Tracked files removed because the target lacks them.
    pub deleted: Vec<String>,
}

/// An arbor repository.
pub struct Repository {
    /// Path to the `.arbor/` directory.
    arbor_dir: PathBuf,
    /// Content-addressable object store.
    objects: ObjectStore,
    /// Branches and HEAD.
    refs: RefTable,
    /// The working directory.
    worktree: FsWorkTree,
    config: RepoConfig,
}

impl Repository {
    /// Initialize a new repository in the given directory with default settings.
    pub fn init(root: &Path) -> ArborResult<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Initialize a new repository.
    ///
    /// Creates `.arbor/`, the root commit (empty snapshot, dated at the Unix
    /// epoch) and the default branch with HEAD attached to it.
    pub fn init_with_config(root: &Path, config: RepoConfig) -> ArborResult<Self> {
        let arbor_dir = root.join(ARBOR_DIR);
        if arbor_dir.exists() {
            return Err(ArborError::AlreadyExists);
        }
        crate::refs::validate_branch_name(&config.default_branch)?;

        fs::create_dir_all(arbor_dir.join("objects"))?;
        fs::create_dir_all(arbor_dir.join("refs").join("heads"))?;
        config.save(&arbor_dir.join(CONFIG_FILE))?;
        Staging::default().save(&arbor_dir.join(STAGING_FILE))?;

        let objects = ObjectStore::new(&arbor_dir.join("objects"));
        let empty_tree = objects.put_tree(&Tree::default())?;
        let root_commit = objects.put_commit(&Commit::initial(empty_tree))?;

        let refs = RefTable::new(&arbor_dir);
        refs.create_branch(&config.default_branch, &root_commit)?;
        refs.attach_head(&config.default_branch)?;

        info!(
            root = %root.display(),
            branch = %config.default_branch,
            "initialized repository"
        );
        Self::open(root)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> ArborResult<Self> {
        let arbor_dir = root.join(ARBOR_DIR);
        if !arbor_dir.is_dir() {
            return Err(ArborError::NotARepo);
        }
        let config = RepoConfig::load(&arbor_dir.join(CONFIG_FILE))?;
        crate::refs::validate_branch_name(&config.default_branch)?;

        Ok(Self {
            objects: ObjectStore::new(&arbor_dir.join("objects")),
            refs: RefTable::new(&arbor_dir),
            worktree: FsWorkTree::new(root),
            arbor_dir,
            config,
        })
    }

    /// Root of the working directory.
    pub fn root(&self) -> &Path {
        self.worktree.root()
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn graph(&self) -> CommitGraph<'_> {
        CommitGraph::new(&self.objects)
    }

    /// The pending staged changes.
    pub fn staging(&self) -> ArborResult<Staging> {
        Staging::load(&self.arbor_dir.join(STAGING_FILE))
    }

    /// The conflicted merge awaiting resolution, if any.
    pub fn pending_merge(&self) -> ArborResult<Option<PendingMerge>> {
        PendingMerge::load(&self.merge_head_path())
    }

    // -------------------------------------------------------------------
    // Staging
    // -------------------------------------------------------------------

    /// Stage the working copy of `path` for the next commit.
    pub fn add(&self, path: &str) -> ArborResult<AddOutcome> {
        let path = &normalize_path(path)?;
        let _lock = self.lock()?;
        let content = self
            .worktree
            .read_file(path)?
            .ok_or_else(|| ArborError::MissingFile(path.to_string()))?;
        let current = self.head_tree()?;
        let mut staging = self.staging()?;

        let outcome = staging.stage_add(&self.objects, &current, path, &content)?;
        self.save_staging(&staging)?;
        Ok(outcome)
    }

    /// Stage the removal of `path`, deleting the working copy if it is tracked.
    pub fn remove(&self, path: &str) -> ArborResult<RemoveOutcome> {
        let path = &normalize_path(path)?;
        let _lock = self.lock()?;
        let current = self.head_tree()?;
        let mut staging = self.staging()?;

        let outcome = staging.stage_remove(&current, path)?;
        self.save_staging(&staging)?;
        if outcome.delete_from_worktree {
            self.worktree.delete_file(path)?;
        }
        Ok(outcome)
    }

    // -------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------

    /// Snapshot the staging area into a new commit on top of HEAD.
    ///
    /// While a conflicted merge is pending, the new commit gets the merged-in
    /// tip as its second parent and may carry no staged change at all.
    pub fn commit(&self, message: &str) -> ArborResult<LogEntry> {
        if message.trim().is_empty() {
            return Err(ArborError::EmptyMessage);
        }
        let _lock = self.lock()?;
        let head = self.refs.resolve_head()?;
        let current = self.tree_of(&head)?;
        let mut staging = self.staging()?;
        let pending = self.pending_merge()?;

        let snapshot = match &pending {
            Some(_) => staging.apply(&current),
            None => staging.build_commit_snapshot(&current)?,
        };
        let tree = self.objects.put_tree(&snapshot)?;

        let mut parents = vec![head];
        if let Some(p) = &pending {
            parents.push(p.given.clone());
        }
        let commit = Commit::new(message.to_string(), tree, parents);
        let id = self.objects.put_commit(&commit)?;

        self.refs.advance_head(&id)?;
        staging.clear();
        self.save_staging(&staging)?;
        PendingMerge::clear(&self.merge_head_path())?;

        info!(commit = %id.short(), files = snapshot.len(), merge = commit.is_merge(), "committed");
        Ok(LogEntry { id, commit })
    }

    /// First-parent history from HEAD, newest first.
    pub fn log(&self) -> ArborResult<Vec<LogEntry>> {
        let head = self.refs.resolve_head()?;
        Ok(self
            .graph()
            .first_parent_history(&head)?
            .into_iter()
            .map(|(id, commit)| LogEntry { id, commit })
            .collect())
    }

    /// Every commit in the store, newest first.
    pub fn global_log(&self) -> ArborResult<Vec<LogEntry>> {
        let mut entries = Vec::new();
        for id in self.objects.ids()? {
            if let Object::Commit(commit) = self.objects.get_object(&id)? {
                entries.push(LogEntry { id, commit });
            }
        }
        entries.sort_by(|a, b| {
            b.commit
                .timestamp
                .cmp(&a.commit.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    /// Ids of every commit whose message equals `message`.
    pub fn find(&self, message: &str) -> ArborResult<Vec<ObjectId>> {
        Ok(self
            .global_log()?
            .into_iter()
            .filter(|e| e.commit.message == message)
            .map(|e| e.id)
            .collect())
    }

    /// Load one commit by branch name, `HEAD`, full id or unique id prefix.
    pub fn show(&self, rev: &str) -> ArborResult<LogEntry> {
        let id = self.resolve_commit(rev)?;
        let commit = self.graph().commit(&id)?;
        Ok(LogEntry { id, commit })
    }

    /// Resolve a revision to a commit id.
    ///
    /// Accepts `HEAD`, a branch name, a full id, or an id prefix of at
    /// least four hex characters that matches exactly one commit.
    pub fn resolve_commit(&self, rev: &str) -> ArborResult<ObjectId> {
        if rev == "HEAD" {
            return self.refs.resolve_head();
        }
        if crate::refs::validate_branch_name(rev).is_ok() {
            if let Some(id) = self.refs.branch(rev)? {
                return Ok(id);
            }
        }
        if let Some(id) = ObjectId::parse(rev) {
            return match self.objects.get_object(&id) {
                Ok(Object::Commit(_)) => Ok(id),
                Ok(_) | Err(ArborError::NotFound(_)) => {
                    Err(ArborError::CommitNotFound(rev.to_string()))
                }
                Err(e) => Err(e),
            };
        }

        let is_hex = rev.bytes().all(|b| b.is_ascii_hexdigit());
        if rev.len() < MIN_PREFIX_LEN || rev.len() > ID_HEX_LEN || !is_hex {
            return Err(ArborError::CommitNotFound(rev.to_string()));
        }
        let prefix = rev.to_ascii_lowercase();
        let mut matches = Vec::new();
        for id in self.objects.ids()? {
            if id.as_str().starts_with(&prefix)
                && matches!(self.objects.get_object(&id)?, Object::Commit(_))
            {
                matches.push(id);
            }
        }

        match matches.len() {
            0 => Err(ArborError::CommitNotFound(rev.to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(ArborError::AmbiguousCommitId {
                prefix: rev.to_string(),
                count,
            }),
        }
    }

    /// Branches, staging and working-tree state.
    pub fn status(&self) -> ArborResult<Status> {
        let head = self.refs.head()?;
        let current = self.head_tree()?;
        let staging = self.staging()?;
        let (unstaged, untracked) = status::working_changes(&current, &staging, &self.worktree)?;

        Ok(Status {
            head,
            branches: self.branches()?.into_keys().collect(),
            staged: staging.additions.keys().cloned().collect(),
            removed: staging.removals.iter().cloned().collect(),
            unstaged,
            untracked,
            merging: self.pending_merge()?.map(|p| p.given_branch),
        })
    }

    // -------------------------------------------------------------------
    // Branches
    // -------------------------------------------------------------------

    /// Create a branch at the current HEAD commit. HEAD does not move.
    pub fn create_branch(&self, name: &str) -> ArborResult<ObjectId> {
        let _lock = self.lock()?;
        let head = self.refs.resolve_head()?;
        self.refs.create_branch(name, &head)?;
        info!(branch = name, commit = %head.short(), "created branch");
        Ok(head)
    }

    /// Every branch and its tip, sorted by name.
    pub fn branches(&self) -> ArborResult<BTreeMap<String, ObjectId>> {
        self.refs.branches()
    }

    /// Delete a branch name. Its commits stay retrievable by id.
    pub fn delete_branch(&self, name: &str) -> ArborResult<()> {
        let _lock = self.lock()?;
        self.refs.delete_branch(name)?;
        info!(branch = name, "deleted branch");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Checkout / reset
    // -------------------------------------------------------------------

    /// Switch the working tree to a branch's tip and attach HEAD to it.
    pub fn checkout_branch(&self, name: &str) -> ArborResult<CheckoutResult> {
        let _lock = self.lock()?;
        self.ensure_no_pending_merge()?;
        let target = self.refs.branch_tip(name)?;
        if self.refs.current_branch()?.as_deref() == Some(name) {
            debug!(branch = name, "already on branch");
            return Ok(CheckoutResult {
                commit: Some(target),
                ..CheckoutResult::default()
            });
        }

        let result = self.switch_to(&target)?;
        self.refs.attach_head(name)?;
        info!(branch = name, commit = %target.short(), "checked out branch");
        Ok(result)
    }

    /// Switch the working tree to a commit and detach HEAD there.
    pub fn checkout_commit(&self, rev: &str) -> ArborResult<CheckoutResult> {
        let _lock = self.lock()?;
        self.ensure_no_pending_merge()?;
        let target = self.resolve_commit(rev)?;

        let result = self.switch_to(&target)?;
        self.refs.detach_head(&target)?;
        info!(commit = %target.short(), "checked out detached HEAD");
        Ok(result)
    }

    /// Restore one file from a commit (HEAD when `rev` is None) without staging it.
    pub fn checkout_file(&self, rev: Option<&str>, path: &str) -> ArborResult<()> {
        let path = &normalize_path(path)?;
        let _lock = self.lock()?;
        let id = match rev {
            Some(rev) => self.resolve_commit(rev)?,
            None => self.refs.resolve_head()?,
        };
        let tree = self.tree_of(&id)?;
        let blob = tree
            .get(path)
            .ok_or_else(|| ArborError::FileNotInCommit(path.to_string()))?;
        self.worktree.write_file(path, &self.objects.get_blob(blob)?)?;
        debug!(path, commit = %id.short(), "restored file");
        Ok(())
    }

    /// Check out a commit and move the current branch (or detached HEAD) to it.
    pub fn reset(&self, rev: &str) -> ArborResult<CheckoutResult> {
        let _lock = self.lock()?;
        let target = self.resolve_commit(rev)?;

        let result = self.switch_to(&target)?;
        self.refs.advance_head(&target)?;
        PendingMerge::clear(&self.merge_head_path())?;
        info!(commit = %target.short(), "reset");
        Ok(result)
    }

    // -------------------------------------------------------------------
    // Merge
    // -------------------------------------------------------------------

    /// Merge branch `name` into the current HEAD.
    pub fn merge(&self, name: &str) -> ArborResult<MergeOutcome> {
        let _lock = self.lock()?;
        self.ensure_no_pending_merge()?;
        let mut staging = self.staging()?;
        if !staging.is_empty() {
            return Err(ArborError::UncommittedChanges);
        }

        let current = self.refs.resolve_head()?;
        let given = self.refs.branch_tip(name)?;
        if current == given {
            return Err(ArborError::SelfMerge);
        }

        let graph = self.graph();
        let base = graph
            .lowest_common_ancestor(&current, &given)?
            .ok_or_else(|| ArborError::UnrelatedHistories(current.to_string(), given.to_string()))?;
        debug!(base = %base.short(), current = %current.short(), given = %given.short(), "merge base");

        if base == given {
            return Err(ArborError::AlreadyUpToDate);
        }
        if base == current {
            self.switch_to(&given)?;
            self.refs.advance_head(&given)?;
            info!(branch = name, commit = %given.short(), "fast-forwarded");
            return Ok(MergeOutcome::FastForward { commit: given });
        }

        let base_tree = self.tree_of(&base)?;
        let current_tree = self.tree_of(&current)?;
        let given_tree = self.tree_of(&given)?;
        let plan = merge::plan(&base_tree, &current_tree, &given_tree);

        // Render conflicted files up front so the untracked check can compare them.
        let mut rendered = Vec::with_capacity(plan.conflicts.len());
        for conflict in &plan.conflicts {
            let cur = self.blob_opt(conflict.current.as_ref())?;
            let giv = self.blob_opt(conflict.given.as_ref())?;
            rendered.push((
                conflict.path.as_str(),
                conflict_markers(cur.as_deref(), giv.as_deref()),
            ));
        }

        for (path, blob) in &plan.take {
            if !current_tree.contains(path) {
                self.ensure_not_clobbered(path, blob)?;
            }
        }
        for (path, bytes) in &rendered {
            if !current_tree.contains(path) {
                self.ensure_not_clobbered(path, &Object::blob_id(bytes)?)?;
            }
        }

        for (path, blob) in &plan.take {
            self.worktree.write_file(path, &self.objects.get_blob(blob)?)?;
        }
        for path in &plan.delete {
            self.worktree.delete_file(path)?;
        }

        let message = format!("Merged {name} into {}.", self.head_label()?);

        if plan.is_clean() {
            let tree = self.objects.put_tree(&plan.merged)?;
            let commit = Commit::new(message, tree, vec![current, given]);
            let id = self.objects.put_commit(&commit)?;
            self.refs.advance_head(&id)?;
            staging.clear();
            self.save_staging(&staging)?;
            info!(branch = name, commit = %id.short(), "merged");
            return Ok(MergeOutcome::Committed { commit: id });
        }

        for (path, bytes) in &rendered {
            self.worktree.write_file(path, bytes)?;
        }
        for (path, blob) in &plan.take {
            staging.additions.insert(path.clone(), blob.clone());
        }
        for path in &plan.delete {
            staging.removals.insert(path.clone());
        }
        self.save_staging(&staging)?;

        let conflicts: Vec<String> = plan.conflicts.iter().map(|c| c.path.clone()).collect();
        PendingMerge {
            given,
            given_branch: name.to_string(),
            message,
            conflicts: conflicts.clone(),
        }
        .save(&self.merge_head_path())?;

        warn!(branch = name, conflicts = conflicts.len(), "merge stopped on conflicts");
        Ok(MergeOutcome::Conflicted { conflicts })
    }

    /// Abandon a conflicted merge, restoring every file it touched to HEAD.
    pub fn abort_merge(&self) -> ArborResult<CheckoutResult> {
        let _lock = self.lock()?;
        let pending = self.pending_merge()?.ok_or(ArborError::NoMergeInProgress)?;
        let head = self.refs.resolve_head()?;
        let current = self.tree_of(&head)?;
        let mut staging = self.staging()?;

        let touched: BTreeSet<String> = staging
            .additions
            .keys()
            .chain(staging.removals.iter())
            .chain(pending.conflicts.iter())
            .cloned()
            .collect();

        let mut result = CheckoutResult {
            commit: Some(head),
            ..CheckoutResult::default()
        };
        for path in touched {
            match current.get(&path) {
                Some(blob) => {
                    self.worktree.write_file(&path, &self.objects.get_blob(blob)?)?;
                    result.written.push(path);
                }
                None if self.worktree.exists(&path)? => {
                    self.worktree.delete_file(&path)?;
                    result.deleted.push(path);
                }
                None => {}
            }
        }

        staging.clear();
        self.save_staging(&staging)?;
        PendingMerge::clear(&self.merge_head_path())?;
        info!(branch = %pending.given_branch, "merge aborted");
        Ok(result)
    }

    // -------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------

    /// Acquire an exclusive lock on the repository.
    fn lock(&self) -> ArborResult<RepoLock> {
        RepoLock::acquire(&self.arbor_dir, self.config.lock_timeout())
    }

    fn merge_head_path(&self) -> PathBuf {
        self.arbor_dir.join(MERGE_HEAD_FILE)
    }

    fn save_staging(&self, staging: &Staging) -> ArborResult<()> {
        staging.save(&self.arbor_dir.join(STAGING_FILE))
    }

    fn ensure_no_pending_merge(&self) -> ArborResult<()> {
        if self.merge_head_path().exists() {
            return Err(ArborError::MergeInProgress);
        }
        Ok(())
    }

    /// Snapshot of a commit.
    fn tree_of(&self, commit: &ObjectId) -> ArborResult<Tree> {
        let commit = self.graph().commit(commit)?;
        self.objects.get_tree(&commit.tree)
    }

    fn head_tree(&self) -> ArborResult<Tree> {
        self.tree_of(&self.refs.resolve_head()?)
    }

    /// Branch name for messages, or `HEAD` when detached.
    fn head_label(&self) -> ArborResult<String> {
        Ok(match self.refs.head()? {
            Head::Attached(name) => name,
            Head::Detached(_) => "HEAD".to_string(),
        })
    }

    fn blob_opt(&self, id: Option<&ObjectId>) -> ArborResult<Option<Vec<u8>>> {
        id.map(|id| self.objects.get_blob(id)).transpose()
    }

    /// Fail if an untracked working file at `path` differs from `blob`.
    fn ensure_not_clobbered(&self, path: &str, blob: &ObjectId) -> ArborResult<()> {
        if let Some(content) = self.worktree.read_file(path)? {
            if Object::blob_id(&content)? != *blob {
                return Err(ArborError::UntrackedFileConflict(path.to_string()));
            }
        }
        Ok(())
    }

    /// Replace the working tree's tracked files with `target`'s snapshot and
    /// clear the staging area.
    ///
    /// Refuses before writing anything if an untracked file would be
    /// overwritten with different content.
    fn switch_to(&self, target: &ObjectId) -> ArborResult<CheckoutResult> {
        let from = self.head_tree()?;
        let to = self.tree_of(target)?;

        for (path, blob) in &to.entries {
            if !from.contains(path) {
                self.ensure_not_clobbered(path, blob)?;
            }
        }

        let mut result = CheckoutResult {
            commit: Some(target.clone()),
            ..CheckoutResult::default()
        };
        for (path, blob) in &to.entries {
            if let Some(content) = self.worktree.read_file(path)? {
                if Object::blob_id(&content)? == *blob {
                    continue;
                }
            }
            self.worktree.write_file(path, &self.objects.get_blob(blob)?)?;
            result.written.push(path.clone());
        }
        for path in from.entries.keys() {
            if !to.contains(path) && self.worktree.exists(path)? {
                self.worktree.delete_file(path)?;
                result.deleted.push(path.clone());
            }
        }

        let mut staging = self.staging()?;
        staging.clear();
        self.save_staging(&staging)?;
        Ok(result)
    }
}
