//! Storage configuration and path management for herald.
//!
//! `StorageConfig` is the single place that decides where herald keeps its
//! files. Production code uses `StorageConfig::default()` (`~/.herald/`);
//! tests inject a temp directory with `StorageConfig::with_root()`.

use std::env;
use std::path::{Path, PathBuf};

pub const SOCKET_ENV: &str = "HERALD_SOCKET";
const SOCKET_NAME: &str = "herald.sock";

/// Central configuration for all herald storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all herald data (default: ~/.herald)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(env::temp_dir);
        Self {
            root: home.join(".herald"),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json (client preferences).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Default location of the banner service socket.
    /// `HERALD_SOCKET` wins over both this and the config file.
    pub fn socket_path(&self) -> PathBuf {
        self.root.join(SOCKET_NAME)
    }

    /// Directory backing the permanent dismissal scope.
    pub fn permanent_scope_dir(&self) -> PathBuf {
        self.root.join("dismissed")
    }

    /// Directory backing a named session's dismissal scope.
    pub fn session_scope_dir(&self, session_id: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(Self::encode_session_id(session_id))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Makes a session id safe to use as a single directory name.
    pub fn encode_session_id(session_id: &str) -> String {
        session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Resolves the socket to talk to: env override, then config, then default.
pub fn resolve_socket_path(storage: &StorageConfig, configured: Option<&Path>) -> PathBuf {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| storage.socket_path())
}
