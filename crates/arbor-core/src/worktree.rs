//! Working-directory access.
//!
//! The core never touches user files directly; it goes through the
//! [`WorkTree`] trait. [`FsWorkTree`] is the on-disk implementation used by
//! [`Repository`](crate::Repository).

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ArborError, ArborResult};
use crate::fsutil::remove_if_exists;
use crate::ignore::IgnoreRules;

/// Repository state directory, never part of a snapshot.
pub const ARBOR_DIR: &str = ".arbor";

/// Canonical repository-relative form of `rel_path`: `/`-joined components
/// with `.` and empty segments dropped.
///
/// Rejects absolute paths, `..` components, and anything under `.arbor`.
pub fn normalize_path(rel_path: &str) -> ArborResult<String> {
    let reject = || ArborError::PathTraversal(rel_path.to_string());
    if rel_path.starts_with('/') || rel_path.starts_with('\\') {
        return Err(reject());
    }

    let mut parts = Vec::new();
    for component in Path::new(rel_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(reject)?),
            Component::CurDir => {}
            _ => return Err(reject()),
        }
    }

    match parts.first() {
        None => Err(reject()),
        Some(&first) if first == ARBOR_DIR => Err(reject()),
        Some(_) => Ok(parts.join("/")),
    }
}

/// File operations the core needs from a working directory.
///
/// Paths are repository-relative and `/`-separated.
pub trait WorkTree {
    /// Read a file, or None if it does not exist.
    fn read_file(&self, path: &str) -> ArborResult<Option<Vec<u8>>>;

    /// Create or overwrite a file, creating parent directories.
    fn write_file(&self, path: &str, data: &[u8]) -> ArborResult<()>;

    /// Delete a file if present.
    fn delete_file(&self, path: &str) -> ArborResult<()>;

    /// Whether a regular file exists at `path`.
    fn exists(&self, path: &str) -> ArborResult<bool>;

    /// Every non-ignored regular file, sorted.
    fn list_candidates(&self) -> ArborResult<Vec<String>>;
}

/// A working directory on the local filesystem.
pub struct FsWorkTree {
    root: PathBuf,
    rules: IgnoreRules,
}

impl FsWorkTree {
    /// Open the working directory at `root`, reading its ignore rules.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            rules: IgnoreRules::load(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a relative path and return its absolute form within the root.
    fn validate_path(&self, rel_path: &str) -> ArborResult<PathBuf> {
        Ok(self.root.join(normalize_path(rel_path)?))
    }

    /// Remove empty directories from `dir` upward, stopping at the root.
    fn remove_empty_dirs(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

impl WorkTree for FsWorkTree {
    fn read_file(&self, path: &str) -> ArborResult<Option<Vec<u8>>> {
        let full = self.validate_path(path)?;
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(&full)?))
    }

    fn write_file(&self, path: &str, data: &[u8]) -> ArborResult<()> {
        let full = self.validate_path(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, data)?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> ArborResult<()> {
        let full = self.validate_path(path)?;
        remove_if_exists(&full)?;
        if let Some(parent) = full.parent() {
            self.remove_empty_dirs(parent);
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> ArborResult<bool> {
        Ok(self.validate_path(path)?.is_file())
    }

    fn list_candidates(&self) -> ArborResult<Vec<String>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|e| {
            !(e.file_type().is_dir() && self.rules.is_dir_ignored(&e.file_name().to_string_lossy()))
        });

        for entry in walker {
            let entry = entry.map_err(|e| {
                ArborError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel_path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if self.rules.is_file_ignored(&rel_path) {
                continue;
            }
            out.push(rel_path);
        }

        out.sort();
        Ok(out)
    }
}

/// Render both sides of a conflicted file with conflict delimiters.
///
/// A side that deleted the file contributes nothing between its markers.
pub fn conflict_markers(current: Option<&[u8]>, given: Option<&[u8]>) -> Vec<u8> {
    let mut out = b"<<<<<<< HEAD\n".to_vec();
    out.extend_from_slice(current.unwrap_or_default());
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(given.unwrap_or_default());
    out.extend_from_slice(b">>>>>>>\n");
    out
}
