//! Configuration loading.
//!
//! A missing or unreadable config file yields defaults; herald never refuses
//! to start over configuration.

use crate::storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REFRESH_GUARD_MS: u64 = 500;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// Minimum spacing between one-shot refreshes, measured from request time.
    pub refresh_guard_ms: u64,
    pub connect_timeout_ms: u64,
    /// Upper bound for a one-shot fetch round trip.
    pub request_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// When false only one-shot refreshes are used.
    pub stream_enabled: bool,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            refresh_guard_ms: DEFAULT_REFRESH_GUARD_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            socket_path: None,
            stream_enabled: true,
        }
    }
}

impl HeraldConfig {
    pub fn refresh_guard(&self) -> Duration {
        Duration::from_millis(self.refresh_guard_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Loads the configuration, returning defaults if the file doesn't exist or is corrupt.
pub fn load_config_with_storage(storage: &StorageConfig) -> HeraldConfig {
    let path = storage.config_file();
    let content = match fs_err::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return HeraldConfig::default(),
    };
    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Ignoring malformed herald config");
            HeraldConfig::default()
        }
    }
}
