//! Error types for herald-core operations.
//!
//! Every variant is recoverable. `BannerCenter` logs these and degrades to
//! "fewer banners shown"; they only surface through the lower-level APIs.

use herald_protocol::ErrorInfo;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    // ─────────────────────────────────────────────────────────────────────
    // Remote Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Banner service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Banner stream dropped: {0}")]
    StreamTransport(String),

    #[error("Malformed banner message: {0}")]
    MalformedMessage(String),

    #[error("Banner service rejected request: {0}")]
    Protocol(ErrorInfo),

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Dismissal storage unavailable: {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using HeraldError.
pub type Result<T> = std::result::Result<T, HeraldError>;

impl HeraldError {
    /// True for failures of the live channel itself, as opposed to one bad message.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HeraldError::StreamTransport(_) | HeraldError::RemoteUnavailable(_)
        )
    }
}
