//! Path management for dispatch client data.
//!
//! All on-disk locations are decided here so tests can point the client at a
//! temp directory with `StorageConfig::with_root()`.

use std::path::{Path, PathBuf};

const ROOT_DIR_NAME: &str = ".dispatch";

/// Central configuration for all dispatch client storage paths.
///
/// Production code uses `StorageConfig::default()` which points to `~/.dispatch/`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            root: home.join(ROOT_DIR_NAME),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to client.toml (API endpoint, unit kind, push address).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("client.toml")
    }

    /// Path to logs/ (rolling CLI log files).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
