//! Commits: immutable historical states.
//!
//! A commit records a snapshot (tree id), the commits it descends from,
//! a message and a timestamp. Its identity is the digest of its serialized
//! form, so the id covers both the snapshot and the full ancestry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ObjectId;

/// Message of the root commit created by `init`.
pub const INITIAL_MESSAGE: &str = "initial commit";

/// A commit. Field order is part of the serialized identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    /// Human-readable description of the change.
    pub message: String,
    /// Author timestamp.
    pub timestamp: DateTime<Utc>,
    /// Snapshot of tracked files.
    pub tree: ObjectId,
    /// Parent commits. For merges: `[current tip, merged-in tip]`.
    pub parents: Vec<ObjectId>,
}

impl Commit {
    /// Create a commit stamped with the current time.
    pub fn new(message: String, tree: ObjectId, parents: Vec<ObjectId>) -> Self {
        Commit {
            message,
            timestamp: Utc::now(),
            tree,
            parents,
        }
    }

    /// The parentless commit every repository starts from, dated at the Unix epoch.
    pub fn initial(empty_tree: ObjectId) -> Self {
        Commit {
            message: INITIAL_MESSAGE.to_string(),
            timestamp: DateTime::UNIX_EPOCH,
            tree: empty_tree,
            parents: Vec::new(),
        }
    }

    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use chrono::TimeZone;

    #[test]
    fn test_initial_commit_is_deterministic() {
        let tree = ObjectId::of(b"tree");
        let a = Object::Commit(Commit::initial(tree.clone())).encode().unwrap();
        let b = Object::Commit(Commit::initial(tree)).encode().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parents_change_identity() {
        let tree = ObjectId::of(b"tree");
        let ts = Utc.timestamp_opt(100, 0).unwrap();
        let base = Commit {
            message: "m".into(),
            timestamp: ts,
            tree: tree.clone(),
            parents: vec![ObjectId::of(b"p1")],
        };
        let mut other = base.clone();
        other.parents.push(ObjectId::of(b"p2"));

        let a = ObjectId::of(&Object::Commit(base).encode().unwrap());
        let b = ObjectId::of(&Object::Commit(other.clone()).encode().unwrap());
        assert_ne!(a, b);
        assert!(other.is_merge());
    }

    #[test]
    fn test_parent_order_changes_identity() {
        let tree = ObjectId::of(b"tree");
        let ts = Utc.timestamp_opt(100, 0).unwrap();
        let p1 = ObjectId::of(b"p1");
        let p2 = ObjectId::of(b"p2");
        let c1 = Commit {
            message: "merge".into(),
            timestamp: ts,
            tree: tree.clone(),
            parents: vec![p1.clone(), p2.clone()],
        };
        let c2 = Commit {
            parents: vec![p2, p1.clone()],
            ..c1.clone()
        };
        assert_eq!(c1.first_parent(), Some(&p1));
        assert_ne!(
            Object::Commit(c1).encode().unwrap(),
            Object::Commit(c2).encode().unwrap()
        );
    }
}
