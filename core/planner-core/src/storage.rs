//! Storage configuration and path management for the planner client.
//!
//! Centralizes every on-disk location the client touches so that tests can
//! inject a temp directory with [`StorageConfig::with_root`].

use std::path::{Path, PathBuf};

const ROOT_DIR_NAME: &str = ".course-planner";

/// Central configuration for all client storage paths.
///
/// Production code uses `StorageConfig::default()` which points to
/// `~/.course-planner/`. Tests use `StorageConfig::with_root(temp_dir)`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // No home directory (service accounts, some containers): fall back to
        // the temp dir rather than refusing to start.
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            root: home.join(ROOT_DIR_NAME),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory for client data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to credentials.json (token, user snapshot, session id).
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    /// Path to config.toml (API location, timeouts, session TTL).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to logs/ directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.root)?;
        fs_err::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
