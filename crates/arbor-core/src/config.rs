//! Repository configuration stored at `.arbor/config.json`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ArborResult;
use crate::fsutil::atomic_write;

fn default_branch() -> String {
    "master".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

/// Per-repository settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Branch created by `init`.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// How long a mutating operation waits for the repository lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl RepoConfig {
    /// Load from disk; a missing file yields defaults.
    pub fn load(path: &Path) -> ArborResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> ArborResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = RepoConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, RepoConfig::default());
        assert_eq!(config.default_branch, "master");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_branch": "main"}"#).unwrap();

        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = RepoConfig {
            default_branch: "trunk".into(),
            lock_timeout_ms: 250,
        };
        config.save(&path).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap(), config);
    }
}
