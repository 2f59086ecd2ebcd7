//! Filesystem utilities for crash-safe writes.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::ArborResult;

/// Write data to a file atomically using temp-file-then-rename.
///
/// On POSIX, `rename()` within the same filesystem is atomic: either the
/// old file or the new file is visible, never a partial write. The temp
/// file is fsynced before the rename and the parent directory after it, so
/// both the data and the new directory entry are durable on return.
pub fn atomic_write(path: &Path, data: &[u8]) -> ArborResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    sync_dir(parent)
}

/// Flush a directory's entries to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> ArborResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directories cannot be opened for syncing here; rename durability is left
/// to the filesystem.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> ArborResult<()> {
    Ok(())
}

/// Remove a file if it exists; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> ArborResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
