//! .arborignore: user-configurable file/directory ignore rules.
//!
//! A simplified .gitignore-like format:
//! - Blank lines are ignored
//! - Lines starting with `#` are comments
//! - Directory names (e.g., `target`) match any directory with that name
//! - Glob patterns (e.g., `*.pyc`) match against file names
//!
//! `.arbor` is ALWAYS ignored. When a `.arborignore` file exists, it replaces
//! the other defaults.

use std::fs;
use std::path::Path;

use glob::Pattern;

/// Name of the ignore file at the repository root.
pub const IGNORE_FILE: &str = ".arborignore";

/// Directories that are ALWAYS ignored, regardless of `.arborignore` contents.
const ALWAYS_IGNORED_DIRS: &[&str] = &[".arbor"];

/// Default ignore rules used when no `.arborignore` file exists.
const DEFAULT_IGNORE_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// A parsed set of ignore rules.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    /// Directory names to ignore (exact match against any path component).
    dir_names: Vec<String>,
    /// Patterns matched against file names.
    file_globs: Vec<Pattern>,
}

impl IgnoreRules {
    /// Load from `.arborignore` at repo root, or fall back to defaults.
    pub fn load(repo_root: &Path) -> Self {
        match fs::read_to_string(repo_root.join(IGNORE_FILE)) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::defaults(),
        }
    }

    pub fn defaults() -> Self {
        let dir_names = ALWAYS_IGNORED_DIRS
            .iter()
            .chain(DEFAULT_IGNORE_DIRS)
            .map(|s| s.to_string())
            .collect();
        IgnoreRules {
            dir_names,
            file_globs: Vec::new(),
        }
    }

    /// Parse `.arborignore` content. Invalid glob patterns are skipped.
    pub fn parse(content: &str) -> Self {
        let mut dir_names: Vec<String> =
            ALWAYS_IGNORED_DIRS.iter().map(|s| s.to_string()).collect();
        let mut file_globs = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.contains(['*', '?', '[']) {
                if let Ok(pattern) = Pattern::new(trimmed) {
                    file_globs.push(pattern);
                }
            } else {
                dir_names.push(trimmed.trim_end_matches('/').to_string());
            }
        }

        IgnoreRules {
            dir_names,
            file_globs,
        }
    }

    /// Should this directory name be skipped while walking?
    pub fn is_dir_ignored(&self, name: &str) -> bool {
        self.dir_names.iter().any(|d| d == name)
    }

    /// Should this file be ignored? Checks the file name against glob patterns.
    pub fn is_file_ignored(&self, rel_path: &str) -> bool {
        let filename = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.file_globs.iter().any(|p| p.matches(filename))
    }
}
