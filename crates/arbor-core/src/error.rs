//! Error types for arbor operations.

use std::io;

use thiserror::Error;

/// All possible arbor errors.
#[derive(Debug, Error)]
pub enum ArborError {
    /// The current directory is not an arbor repository.
    #[error("not an arbor repository (missing .arbor/)")]
    NotARepo,
    /// An arbor repository already exists here.
    #[error(".arbor/ already exists")]
    AlreadyExists,
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// An object with the given digest is not in the store.
    #[error("object not found: {0}")]
    NotFound(String),
    /// A stored object could not be decoded or has the wrong kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: String, reason: String },
    /// History references an object missing from the store.
    #[error("corrupt history: missing or invalid reference to {0}")]
    CorruptHistory(String),
    /// Two commits share no ancestor.
    #[error("refusing to merge unrelated histories: {0} and {1}")]
    UnrelatedHistories(String, String),
    /// No commit matches the given id or prefix.
    #[error("no commit with that id exists: {0}")]
    CommitNotFound(String),
    /// A short commit id matched more than one commit.
    #[error("ambiguous commit id '{prefix}' matches {count} commits")]
    AmbiguousCommitId { prefix: String, count: usize },
    /// The working file does not exist.
    #[error("file does not exist: {0}")]
    MissingFile(String),
    /// The path is neither tracked nor staged.
    #[error("no reason to remove the file: {0}")]
    NotTracked(String),
    /// No staged changes relative to the current commit.
    #[error("no changes added to the commit")]
    NothingToCommit,
    /// Commit message was blank.
    #[error("please enter a commit message")]
    EmptyMessage,
    /// A branch with this name already exists.
    #[error("a branch with that name already exists: {0}")]
    BranchExists(String),
    /// No branch has this name.
    #[error("a branch with that name does not exist: {0}")]
    NoSuchBranch(String),
    /// The branch HEAD is attached to cannot be deleted.
    #[error("cannot remove the current branch: {0}")]
    CannotDeleteCurrentBranch(String),
    /// Branch names must be usable as file names under `refs/heads`.
    #[error("invalid branch name: '{0}'")]
    InvalidBranchName(String),
    /// Attempted to merge a branch into itself.
    #[error("cannot merge a branch with itself")]
    SelfMerge,
    /// The given branch is already an ancestor of the current one.
    #[error("given branch is an ancestor of the current branch")]
    AlreadyUpToDate,
    /// Staged changes would be lost by the operation.
    #[error("you have uncommitted changes")]
    UncommittedChanges,
    /// An untracked working file would be overwritten.
    #[error("there is an untracked file in the way; delete it, or add and commit it first: {0}")]
    UntrackedFileConflict(String),
    /// A conflicted merge is waiting to be resolved.
    #[error("a merge is in progress; resolve conflicts and commit, or abort the merge")]
    MergeInProgress,
    /// Abort requested without a pending merge.
    #[error("no merge in progress")]
    NoMergeInProgress,
    /// The requested file does not exist in the commit's snapshot.
    #[error("file does not exist in that commit: {0}")]
    FileNotInCommit(String),
    /// A path escapes the repository root.
    #[error("path escapes repository root: {0}")]
    PathTraversal(String),
    /// Could not acquire the repository lock within the timeout.
    #[error("could not acquire repository lock within timeout")]
    LockTimeout,
}

impl ArborError {
    /// Process exit code for the CLI. Code 1 is reserved for a conflicted merge.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArborError::NotARepo | ArborError::AlreadyExists => 2,
            ArborError::NotFound(_)
            | ArborError::CommitNotFound(_)
            | ArborError::AmbiguousCommitId { .. }
            | ArborError::FileNotInCommit(_)
            | ArborError::MissingFile(_) => 3,
            ArborError::NotTracked(_) => 4,
            ArborError::NothingToCommit | ArborError::EmptyMessage => 5,
            ArborError::BranchExists(_)
            | ArborError::NoSuchBranch(_)
            | ArborError::CannotDeleteCurrentBranch(_)
            | ArborError::InvalidBranchName(_) => 6,
            ArborError::SelfMerge | ArborError::AlreadyUpToDate => 7,
            ArborError::UncommittedChanges
            | ArborError::MergeInProgress
            | ArborError::NoMergeInProgress => 8,
            ArborError::UntrackedFileConflict(_) => 9,
            ArborError::PathTraversal(_) => 10,
            ArborError::LockTimeout => 11,
            ArborError::CorruptObject { .. }
            | ArborError::CorruptHistory(_)
            | ArborError::UnrelatedHistories(..) => 12,
            ArborError::Io(_) | ArborError::Json(_) => 13,
        }
    }
}

/// Convenience alias for Results in arbor.
pub type ArborResult<T> = Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_nonzero_and_skip_conflict_code() {
        let errors = [
            ArborError::NotARepo,
            ArborError::NotFound("ab".into()),
            ArborError::NotTracked("f".into()),
            ArborError::NothingToCommit,
            ArborError::BranchExists("b".into()),
            ArborError::SelfMerge,
            ArborError::UncommittedChanges,
            ArborError::UntrackedFileConflict("f".into()),
            ArborError::CorruptHistory("ab".into()),
        ];
        for e in &errors {
            assert!(e.exit_code() > 1, "{e} mapped to {}", e.exit_code());
        }
    }

    #[test]
    fn test_display_mentions_branch() {
        let e = ArborError::CannotDeleteCurrentBranch("master".into());
        assert!(e.to_string().contains("master"));
    }
}
