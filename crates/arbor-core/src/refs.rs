//! Branch references and HEAD.
//!
//! Each branch is one file under `.arbor/refs/heads/` holding a commit id.
//! `.arbor/HEAD` holds either `ref: refs/heads/<branch>` (attached) or a bare
//! commit id (detached). Every write goes through `atomic_write`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{ArborError, ArborResult};
use crate::fsutil::atomic_write;
use crate::hash::ObjectId;

const HEAD_FILE: &str = "HEAD";
const HEADS_DIR: &str = "refs/heads";
const REF_PREFIX: &str = "ref: refs/heads/";

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "target", rename_all = "lowercase")]
pub enum Head {
    /// Attached to a branch by name.
    Attached(String),
    /// Pointing directly at a commit.
    Detached(ObjectId),
}

/// The reference table of one repository.
pub struct RefTable {
    /// Path to the `.arbor/` directory.
    arbor_dir: PathBuf,
}

impl RefTable {
    pub fn new(arbor_dir: &Path) -> Self {
        Self {
            arbor_dir: arbor_dir.to_path_buf(),
        }
    }

    /// Read the HEAD record.
    pub fn head(&self) -> ArborResult<Head> {
        let content = fs::read_to_string(self.arbor_dir.join(HEAD_FILE))?;
        let trimmed = content.trim();
        if let Some(name) = trimmed.strip_prefix(REF_PREFIX) {
            return Ok(Head::Attached(name.to_string()));
        }
        ObjectId::parse(trimmed)
            .map(Head::Detached)
            .ok_or_else(|| ArborError::CorruptHistory(format!("HEAD ({trimmed})")))
    }

    /// Name of the branch HEAD is attached to, if any.
    pub fn current_branch(&self) -> ArborResult<Option<String>> {
        Ok(match self.head()? {
            Head::Attached(name) => Some(name),
            Head::Detached(_) => None,
        })
    }

    /// Dereference HEAD to a commit id.
    pub fn resolve_head(&self) -> ArborResult<ObjectId> {
        match self.head()? {
            Head::Attached(name) => self
                .branch(&name)?
                .ok_or_else(|| ArborError::CorruptHistory(format!("refs/heads/{name}"))),
            Head::Detached(id) => Ok(id),
        }
    }

    /// Look up one branch.
    pub fn branch(&self, name: &str) -> ArborResult<Option<ObjectId>> {
        let path = self.branch_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        ObjectId::parse(content.trim())
            .map(Some)
            .ok_or_else(|| ArborError::CorruptHistory(format!("refs/heads/{name}")))
    }

    /// Look up one branch, failing with `NoSuchBranch` when absent.
    pub fn branch_tip(&self, name: &str) -> ArborResult<ObjectId> {
        self.branch(name)?
            .ok_or_else(|| ArborError::NoSuchBranch(name.to_string()))
    }

    /// All branches, sorted by name.
    pub fn branches(&self) -> ArborResult<BTreeMap<String, ObjectId>> {
        let mut out = BTreeMap::new();
        let dir = self.arbor_dir.join(HEADS_DIR);
        if !dir.exists() {
            return Ok(out);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".tmp") || !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(id) = self.branch(&name)? {
                out.insert(name, id);
            }
        }
        Ok(out)
    }

    pub fn create_branch(&self, name: &str, commit: &ObjectId) -> ArborResult<()> {
        validate_branch_name(name)?;
        if self.branch_path(name).exists() {
            return Err(ArborError::BranchExists(name.to_string()));
        }
        self.write_branch(name, commit)
    }

    /// Repoint an existing branch.
    pub fn move_branch(&self, name: &str, commit: &ObjectId) -> ArborResult<()> {
        if !self.branch_path(name).exists() {
            return Err(ArborError::NoSuchBranch(name.to_string()));
        }
        self.write_branch(name, commit)
    }

    /// Remove a branch name. The commits it pointed at stay in the store.
    pub fn delete_branch(&self, name: &str) -> ArborResult<()> {
        let path = self.branch_path(name);
        if !path.exists() {
            return Err(ArborError::NoSuchBranch(name.to_string()));
        }
        if self.current_branch()?.as_deref() == Some(name) {
            return Err(ArborError::CannotDeleteCurrentBranch(name.to_string()));
        }
        fs::remove_file(&path)?;
        debug!(branch = name, "deleted branch");
        Ok(())
    }

    pub fn attach_head(&self, name: &str) -> ArborResult<()> {
        if !self.branch_path(name).exists() {
            return Err(ArborError::NoSuchBranch(name.to_string()));
        }
        atomic_write(
            &self.arbor_dir.join(HEAD_FILE),
            format!("{REF_PREFIX}{name}\n").as_bytes(),
        )?;
        debug!(branch = name, "attached HEAD");
        Ok(())
    }

    pub fn detach_head(&self, commit: &ObjectId) -> ArborResult<()> {
        atomic_write(
            &self.arbor_dir.join(HEAD_FILE),
            format!("{commit}\n").as_bytes(),
        )?;
        debug!(commit = %commit.short(), "detached HEAD");
        Ok(())
    }

    /// Move whatever HEAD designates to `commit`: the attached branch, or
    /// HEAD itself when detached.
    pub fn advance_head(&self, commit: &ObjectId) -> ArborResult<()> {
        match self.head()? {
            Head::Attached(name) => self.move_branch(&name, commit),
            Head::Detached(_) => self.detach_head(commit),
        }
    }

    fn write_branch(&self, name: &str, commit: &ObjectId) -> ArborResult<()> {
        atomic_write(&self.branch_path(name), format!("{commit}\n").as_bytes())?;
        debug!(branch = name, commit = %commit.short(), "updated branch");
        Ok(())
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.arbor_dir.join(HEADS_DIR).join(name)
    }
}

/// Branch names become file names, so they must be a single safe path component.
pub fn validate_branch_name(name: &str) -> ArborResult<()> {
    let invalid = name.is_empty()
        || name.len() > 255
        || name.starts_with('.')
        || name.starts_with('-')
        || name.ends_with(".tmp")
        || name.contains("..")
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control() || c == ':');
    if invalid {
        return Err(ArborError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}
