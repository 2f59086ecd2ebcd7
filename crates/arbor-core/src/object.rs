//! Content-addressable object store.
//!
//! Objects are stored in `.arbor/objects/` using a 2-character prefix
//! directory scheme (like git). Each object is identified by the SHA-256
//! of its serialized bytes.
//!
//! Every serialized object starts with a header `<kind> <len>\0` followed
//! by the payload. Blobs carry raw file bytes; trees and commits carry
//! compact JSON whose key order is fixed, so equal values always encode to
//! equal bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commit::Commit;
use crate::error::{ArborError, ArborResult};
use crate::fsutil::atomic_write;
use crate::hash::ObjectId;

/// Discriminant of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    fn tag(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

/// A snapshot: repository-relative path -> blob id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    pub entries: BTreeMap<String, ObjectId>,
}

impl Tree {
    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: &str, blob: ObjectId) {
        self.entries.insert(path.to_string(), blob);
    }

    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The closed set of storable objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Canonical serialized form: header plus payload.
    pub fn encode(&self) -> ArborResult<Vec<u8>> {
        let payload = match self {
            Object::Blob(data) => data.clone(),
            Object::Tree(tree) => serde_json::to_vec(tree)?,
            Object::Commit(commit) => serde_json::to_vec(commit)?,
        };
        let mut out = format!("{} {}\0", self.kind().tag(), payload.len()).into_bytes();
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Parse serialized bytes. `id` is only used for error messages.
    pub fn decode(id: &ObjectId, data: &[u8]) -> ArborResult<Self> {
        let corrupt = |reason: &str| ArborError::CorruptObject {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let nul = data
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("missing header"))?;
        let header = std::str::from_utf8(&data[..nul]).map_err(|_| corrupt("non-UTF-8 header"))?;
        let (tag, len) = header
            .split_once(' ')
            .ok_or_else(|| corrupt("malformed header"))?;
        let kind = ObjectKind::from_tag(tag).ok_or_else(|| corrupt("unknown object kind"))?;
        let len: usize = len.parse().map_err(|_| corrupt("malformed length"))?;
        let payload = &data[nul + 1..];
        if payload.len() != len {
            return Err(corrupt("length mismatch"));
        }

        Ok(match kind {
            ObjectKind::Blob => Object::Blob(payload.to_vec()),
            ObjectKind::Tree => Object::Tree(serde_json::from_slice(payload)?),
            ObjectKind::Commit => Object::Commit(serde_json::from_slice(payload)?),
        })
    }

    /// The id a blob with this content receives, without storing it.
    pub fn blob_id(content: &[u8]) -> ArborResult<ObjectId> {
        Ok(ObjectId::of(&Object::Blob(content.to_vec()).encode()?))
    }
}

/// The object store manages content-addressable storage on disk.
pub struct ObjectStore {
    /// Root path: `.arbor/objects/`
    root: PathBuf,
}

impl ObjectStore {
    /// Create a new ObjectStore rooted at the given path.
    pub fn new(objects_dir: &Path) -> Self {
        Self {
            root: objects_dir.to_path_buf(),
        }
    }

    /// Store bytes and return their content hash.
    ///
    /// If the object already exists (same content), this is a no-op
    /// and simply returns the existing hash. New objects are durable
    /// before this returns.
    pub fn put(&self, data: &[u8]) -> ArborResult<ObjectId> {
        let id = ObjectId::of(data);
        let path = self.object_path(&id);

        if path.exists() {
            return Ok(id);
        }

        atomic_write(&path, data)?;
        debug!(id = %id.short(), bytes = data.len(), "stored object");
        Ok(id)
    }

    /// Retrieve an object's serialized bytes by its id.
    pub fn get(&self, id: &ObjectId) -> ArborResult<Vec<u8>> {
        let path = self.object_path(id);
        if !path.exists() {
            return Err(ArborError::NotFound(id.to_string()));
        }
        Ok(fs::read(&path)?)
    }

    /// Check if an object exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).exists()
    }

    /// Every id currently in the store, sorted.
    pub fn ids(&self) -> ArborResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        if !self.root.exists() {
            return Ok(ids);
        }
        for prefix in fs::read_dir(&self.root)? {
            let prefix = prefix?;
            if !prefix.file_type()?.is_dir() {
                continue;
            }
            let head = prefix.file_name().to_string_lossy().to_string();
            for entry in fs::read_dir(prefix.path())? {
                let name = entry?.file_name().to_string_lossy().to_string();
                if let Some(id) = ObjectId::parse(&format!("{head}{name}")) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn put_object(&self, object: &Object) -> ArborResult<ObjectId> {
        self.put(&object.encode()?)
    }

    pub fn get_object(&self, id: &ObjectId) -> ArborResult<Object> {
        Object::decode(id, &self.get(id)?)
    }

    pub fn put_blob(&self, content: &[u8]) -> ArborResult<ObjectId> {
        self.put_object(&Object::Blob(content.to_vec()))
    }

    pub fn get_blob(&self, id: &ObjectId) -> ArborResult<Vec<u8>> {
        match self.get_object(id)? {
            Object::Blob(data) => Ok(data),
            other => Err(Self::wrong_kind(id, ObjectKind::Blob, other.kind())),
        }
    }

    pub fn put_tree(&self, tree: &Tree) -> ArborResult<ObjectId> {
        self.put_object(&Object::Tree(tree.clone()))
    }

    pub fn get_tree(&self, id: &ObjectId) -> ArborResult<Tree> {
        match self.get_object(id)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(Self::wrong_kind(id, ObjectKind::Tree, other.kind())),
        }
    }

    pub fn put_commit(&self, commit: &Commit) -> ArborResult<ObjectId> {
        self.put_object(&Object::Commit(commit.clone()))
    }

    pub fn get_commit(&self, id: &ObjectId) -> ArborResult<Commit> {
        match self.get_object(id)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(Self::wrong_kind(id, ObjectKind::Commit, other.kind())),
        }
    }

    fn wrong_kind(id: &ObjectId, want: ObjectKind, got: ObjectKind) -> ArborError {
        ArborError::CorruptObject {
            id: id.to_string(),
            reason: format!("expected {}, found {}", want.tag(), got.tag()),
        }
    }

    /// Get the filesystem path for an object id.
    ///
    /// Uses 2-char prefix directories: id `abcdef...` -> `ab/cdef...`
    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let (prefix, rest) = id.as_str().split_at(2);
        self.root.join(prefix).join(rest)
    }
}
